use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use geojson::Value;
use insta::assert_json_snapshot;
use pretty_assertions::assert_eq;
use printspec_core::layers::LayerDescriptor;
use printspec_core::legend::{CatalogRecord, LegendEntry, LegendGraphic};
use printspec_core::model::{
    Extent, Feature, FeatureGeometry, Fill, Layer, LayerKind, PointSymbol, RasterSource, Style,
    StyleSource, Text, VectorSource, ViewState,
};
use printspec_core::registry::{LayerRegistry, LegendRegistry, MetadataError, MetadataService};
use printspec_core::spec::{Gfi, GfiLayer, GfiValue, PrintRequest, PrintSpecAssembler};
use printspec_core::style::{GraphicResolver, StyleError};
use printspec_core::{GatherOutcome, PrintError, gather_metadata};
use serde_json::json;

#[derive(Debug)]
struct Map {
    layers: Vec<Layer>,
    features: HashMap<String, Vec<Feature>>,
}

impl LayerRegistry for Map {
    fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn features_in_extent(&self, layer_id: &str, _extent: &Extent) -> Vec<Feature> {
        self.features.get(layer_id).cloned().unwrap_or_default()
    }

    fn view(&self) -> ViewState {
        ViewState {
            resolution: 2.0,
            center: [565_000.0, 5_934_000.0],
            extent: Extent::around([565_000.0, 5_934_000.0], 2000.0, 800.0),
            size: [1000.0, 400.0],
            projection: "EPSG:25832".to_string(),
            meters_per_unit: 1.0,
        }
    }
}

#[derive(Debug)]
struct Legends(HashMap<String, LegendEntry>);

impl LegendRegistry for Legends {
    fn legend_entry(&self, layer_id: &str) -> Option<LegendEntry> {
        self.0.get(layer_id).cloned()
    }
}

#[derive(Debug)]
struct Catalog;

#[async_trait]
impl MetadataService for Catalog {
    async fn fetch(&self, record_id: &str) -> Result<CatalogRecord, MetadataError> {
        match record_id {
            "rec-dop" => Ok(CatalogRecord {
                date: Some("2024-05-01".to_string()),
                owner: Some("Landesbetrieb Geoinformation".to_string()),
                street: Some("Neuenfelder Straße".to_string()),
                house_number: Some("19".to_string()),
                postal_code: Some("21109".to_string()),
                city: Some("Hamburg".to_string()),
                ..Default::default()
            }),
            other => Err(MetadataError::NotFound(other.to_string())),
        }
    }
}

fn school_style(feature: &Feature, _resolution: f64) -> Result<Vec<Style>, StyleError> {
    let color = match feature.property_text("kind").as_deref() {
        Some("primary") => "#e3001b",
        Some("secondary") => "#0066ff",
        _ => return Err(StyleError::MissingAttribute("kind".to_string())),
    };
    Ok(vec![Style {
        image: Some(PointSymbol::Circle {
            radius: 5.0,
            fill: Some(Fill {
                color: Some(color.into()),
            }),
            stroke: None,
        }),
        text: Some(Text {
            text: feature.property_text("name"),
            font: Some("bold 12px Arial".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }])
}

fn school(uid: u64, kind: &str, x: f64) -> Feature {
    Feature::new(uid, FeatureGeometry::Simple(Value::Point(vec![x, 5_934_000.0])))
        .with_property("kind", kind)
        .with_property("name", format!("School {uid}"))
        .with_property("tags", json!(["a", "b"]))
}

fn map(schools: Vec<Feature>) -> Map {
    let orthophoto = RasterSource {
        url: "https://geodienste.example.org/wms_dop".to_string(),
        params: BTreeMap::from([
            ("LAYERS".to_string(), json!("dop20")),
            ("TRANSPARENT".to_string(), json!("true")),
        ]),
        ..Default::default()
    };
    let labels = RasterSource {
        url: "https://geodienste.example.org/wms_labels".to_string(),
        params: BTreeMap::from([("LAYERS".to_string(), json!("labels"))]),
        ..Default::default()
    };
    Map {
        layers: vec![
            Layer::new("dop", LayerKind::RasterImage(orthophoto)).with_name("Orthophoto"),
            Layer::new(
                "poi",
                LayerKind::Group(vec![
                    Layer::new(
                        "schools",
                        LayerKind::Vector(VectorSource {
                            style: Some(StyleSource::function(school_style)),
                            style_attributes: vec!["kind".to_string()],
                        }),
                    )
                    .with_name("Schools"),
                ]),
            )
            .with_opacity(0.8),
            Layer::new("labels", LayerKind::RasterTiled(labels))
                .with_resolution_range(Some(10.0), None),
        ],
        features: HashMap::from([("schools".to_string(), schools)]),
    }
}

fn legends() -> Legends {
    Legends(HashMap::from([
        (
            "dop".to_string(),
            LegendEntry {
                layer_name: "Orthophoto".to_string(),
                items: vec![LegendGraphic {
                    name: "DOP 20".to_string(),
                    graphic: "https://geodienste.example.org/wms_dop?request=GetLegendGraphic&layer=dop20".to_string(),
                }],
                metadata_id: Some("rec-dop".to_string()),
            },
        ),
        (
            "schools".to_string(),
            LegendEntry {
                layer_name: "Schools".to_string(),
                items: vec![LegendGraphic {
                    name: "Primary".to_string(),
                    graphic: r#"<svg><circle style="fill:#e3001b"/></svg>"#.to_string(),
                }],
                metadata_id: None,
            },
        ),
    ]))
}

fn request() -> PrintRequest {
    PrintRequest {
        layout: "A4 landscape".to_string(),
        map_size: [770.0, 451.0],
        title: "Schools".to_string(),
        dpi: 96,
        scales: vec![500, 1000, 2500, 5000, 10_000, 25_000],
        ..Default::default()
    }
}

fn schools() -> Vec<Feature> {
    vec![
        school(1, "primary", 565_000.0),
        school(2, "primary", 565_100.0),
        school(3, "secondary", 565_200.0),
        school(4, "primary", 565_300.0),
        Feature::new(5, FeatureGeometry::Simple(Value::Point(vec![]))).with_property("kind", "primary"),
    ]
}

#[test]
fn layers_are_printed_top_first() {
    let map = map(schools());
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let spec = assembler.assemble(&request()).unwrap().take_if_ready().unwrap();

    let types: Vec<_> = spec
        .attributes
        .map
        .layers
        .iter()
        .map(|layer| serde_json::to_value(layer).unwrap()["type"].clone())
        .collect();
    assert_eq!(types, vec![json!("geojson"), json!("WMS")]);
    assert_eq!(spec.attributes.map.scale, 5000);
    assert_eq!(spec.attributes.scale, "1:5000");
    assert_eq!(spec.attributes.map.projection, "EPSG:25832");
    assert!(!spec.attributes.show_gfi);
}

#[test]
fn vector_features_share_rules() {
    let map = map(schools());
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let spec = assembler.assemble(&request()).unwrap().take_if_ready().unwrap();

    let LayerDescriptor::Vector(vector) = &spec.attributes.map.layers[0] else {
        panic!("expected the vector layer on top");
    };
    assert_eq!(vector.opacity, 0.8);
    assert_eq!(vector.geojson.len(), 4);
    let primaries = vector
        .geojson
        .iter()
        .filter(|f| f.property("kind") == Some(&json!("primary")))
        .count();
    assert_eq!(primaries, 3);
    assert!(vector.geojson.iter().all(|f| !f.contains_property("tags")));
    assert_eq!(
        vector.geojson[0].property("label"),
        Some(&json!("School 1"))
    );

    assert_json_snapshot!(vector.style, @r##"
    {
      "version": "2",
      "[kind='primary']": {
        "symbolizers": [
          {
            "type": "point",
            "pointRadius": 5.0,
            "fillColor": "#e3001b",
            "fillOpacity": 1.0,
            "strokeColor": "#3399cc",
            "strokeOpacity": 1.0,
            "strokeWidth": 1.25,
            "graphicName": "circle"
          },
          {
            "type": "text",
            "label": "[label]",
            "fontColor": "#333333",
            "fontOpacity": 1.0,
            "fontFamily": "Arial",
            "fontSize": "12px",
            "fontWeight": "bold",
            "labelAlign": "cm"
          }
        ]
      },
      "[kind='secondary']": {
        "symbolizers": [
          {
            "type": "point",
            "pointRadius": 5.0,
            "fillColor": "#0066ff",
            "fillOpacity": 1.0,
            "strokeColor": "#3399cc",
            "strokeOpacity": 1.0,
            "strokeWidth": 1.25,
            "graphicName": "circle"
          },
          {
            "type": "text",
            "label": "[label]",
            "fontColor": "#333333",
            "fontOpacity": 1.0,
            "fontFamily": "Arial",
            "fontSize": "12px",
            "fontWeight": "bold",
            "labelAlign": "cm"
          }
        ]
      }
    }
    "##);
}

#[test]
fn assembling_twice_is_identical() {
    let map = map(schools());
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let first = assembler.assemble(&request()).unwrap().take_if_ready().unwrap();
    let second = assembler.assemble(&request()).unwrap().take_if_ready().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn failing_style_function_aborts() {
    let map = map(vec![school(1, "primary", 0.0), school(7, "special", 0.0)]);
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let err = assembler.assemble(&request()).unwrap_err();
    assert!(matches!(err, PrintError::Style { ref layer, ref feature, .. } if layer == "schools" && feature == "7"));
}

#[test]
fn request_options_reach_the_job() {
    let map = map(schools());
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let request = PrintRequest {
        scale: Some(2500),
        output_format: "png".to_string(),
        output_filename: Some("schools.png".to_string()),
        show_legend: false,
        gfi: Some(Gfi {
            layers: vec![GfiLayer {
                layer_name: "Schools".to_string(),
                values: vec![GfiValue {
                    key: "name".to_string(),
                    value: "School 1".to_string(),
                }],
            }],
        }),
        ..request()
    };
    let spec = assembler.assemble(&request).unwrap().take_if_ready().unwrap();
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json["outputFormat"], json!("png"));
    assert_eq!(json["outputFilename"], json!("schools.png"));
    assert_eq!(json["attributes"]["scale"], json!("1:2500"));
    assert_eq!(json["attributes"]["showLegend"], json!(false));
    assert_eq!(json["attributes"]["legend"], json!({ "layers": [] }));
    assert_eq!(json["attributes"]["showGfi"], json!(true));
    assert_eq!(
        json["attributes"]["gfi"],
        json!({ "layers": [{ "layerName": "Schools", "values": [{ "key": "name", "value": "School 1" }] }] })
    );
}

#[test]
fn empty_scale_list_without_fixed_scale() {
    let map = map(schools());
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let request = PrintRequest {
        scales: vec![],
        ..request()
    };
    assert!(matches!(
        assembler.assemble(&request),
        Err(PrintError::NoScales)
    ));
}

#[tokio::test]
async fn legend_waits_for_metadata() {
    let map = map(schools());
    let legends = legends();
    let assembler = PrintSpecAssembler::new(&map, &legends, GraphicResolver::default());
    let request = PrintRequest {
        with_metadata: true,
        ..request()
    };
    let mut job = assembler.assemble(&request).unwrap();
    assert_eq!(job.pending().len(), 1);
    assert!(job.take_if_ready().is_none());

    let GatherOutcome::Ready(spec) = gather_metadata(&mut job, &Catalog, None).await else {
        panic!("expected all metadata to arrive");
    };
    assert_json_snapshot!(spec.attributes.legend, @r##"
    {
      "layers": [
        {
          "layerName": "Schools",
          "values": [
            {
              "legendType": "geometry",
              "geometryType": "polygon",
              "color": "#e3001b",
              "label": "Primary"
            }
          ]
        },
        {
          "layerName": "Orthophoto",
          "values": [
            {
              "legendType": "wmsGetLegendGraphic",
              "imageUrl": "https://geodienste.example.org/wms_dop?request=GetLegendGraphic&layer=dop20",
              "label": "DOP 20"
            }
          ],
          "metaDate": "2024-05-01",
          "metaOwner": "Landesbetrieb Geoinformation",
          "metaAddress": "Neuenfelder Straße 19, 21109 Hamburg",
          "metaEmail": "n.N.",
          "metaTel": "n.N.",
          "metaUrl": "n.N."
        }
      ]
    }
    "##);
}
