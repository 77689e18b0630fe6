//! Map-markup (KML) feature tree
//!
//! Parses a KML document into a tree of containers (`kml`, `Document`,
//! `Folder`) and leaf `Placemark`s, and walks that tree lazily to yield every
//! line geometry held by a leaf. `MultiGeometry` parts are flattened into
//! individual lines.

use crate::error::ParseError;
use geo::{Coord, LineString};
use quick_xml::events::Event;
use quick_xml::Reader;

/// A node of the feature tree
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Container {
        name: Option<String>,
        children: Vec<Feature>,
    },
    Placemark {
        name: Option<String>,
        geometry: Option<PlacemarkGeometry>,
    },
}

/// Geometry carried by a placemark
#[derive(Debug, Clone, PartialEq)]
pub enum PlacemarkGeometry {
    LineString(LineString<f64>),
    MultiGeometry(Vec<PlacemarkGeometry>),
    /// Point, Polygon, tracks: kept for completeness, never yielded as lines
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTree {
    roots: Vec<Feature>,
}

impl FeatureTree {
    /// Parse a KML document
    ///
    /// # Errors
    /// Malformed XML, elements left open at end of document, a document
    /// without a `kml`/`Document`/`Folder` root, or unreadable coordinates.
    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        let root = parse_elements(xml)?;

        let roots = match root.name.as_str() {
            "kml" => convert_children(&root)?,
            "Document" | "Folder" => vec![convert_container(&root)?],
            other => {
                return Err(ParseError::new(
                    format!("root element is <{}>, expected <kml>", other),
                    root.position,
                ))
            }
        };

        Ok(Self { roots })
    }

    pub fn features(&self) -> &[Feature] {
        &self.roots
    }

    /// Every line held by a leaf placemark, in document order
    pub fn line_strings(&self) -> LineStrings<'_> {
        LineStrings {
            features: vec![self.roots.iter()],
            geometries: Vec::new(),
        }
    }
}

/// Depth-first walk over a [`FeatureTree`]
pub struct LineStrings<'a> {
    features: Vec<std::slice::Iter<'a, Feature>>,
    geometries: Vec<&'a PlacemarkGeometry>,
}

impl<'a> Iterator for LineStrings<'a> {
    type Item = &'a LineString<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(geometry) = self.geometries.pop() {
                match geometry {
                    PlacemarkGeometry::LineString(line) => return Some(line),
                    PlacemarkGeometry::MultiGeometry(parts) => {
                        self.geometries.extend(parts.iter().rev());
                    }
                    PlacemarkGeometry::Other(_) => {}
                }
                continue;
            }

            let level = self.features.last_mut()?;
            match level.next() {
                None => {
                    self.features.pop();
                }
                Some(Feature::Container { children, .. }) => {
                    self.features.push(children.iter());
                }
                Some(Feature::Placemark {
                    geometry: Some(geometry),
                    ..
                }) => self.geometries.push(geometry),
                Some(Feature::Placemark { geometry: None, .. }) => {}
            }
        }
    }
}

// ============================================================================
// XML -> element tree
// ============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    position: u64,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_elements(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| ParseError::new(e.to_string(), reader.error_position()))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ParseError::new("content after the root element", position));
                }
                stack.push(Element {
                    name: local_name(start.local_name().as_ref()),
                    position,
                    ..Default::default()
                });
            }
            Event::Empty(start) => {
                let element = Element {
                    name: local_name(start.local_name().as_ref()),
                    position,
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(ParseError::new("content after the root element", position))
                    }
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::new("closing tag without opening tag", position))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| ParseError::new(e.to_string(), position))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&unescaped);
                } else if !unescaped.trim().is_empty() {
                    return Err(ParseError::new("text outside of any element", position));
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::new(
            format!("unexpected end of document, <{}> is not closed", open.name),
            reader.buffer_position(),
        ));
    }

    root.ok_or_else(|| ParseError::new("document has no root element", 0))
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

// ============================================================================
// element tree -> feature tree
// ============================================================================

fn convert_children(element: &Element) -> Result<Vec<Feature>, ParseError> {
    let mut features = Vec::new();
    for child in &element.children {
        match child.name.as_str() {
            "Document" | "Folder" => features.push(convert_container(child)?),
            "Placemark" => features.push(convert_placemark(child)?),
            _ => {}
        }
    }
    Ok(features)
}

fn convert_container(element: &Element) -> Result<Feature, ParseError> {
    Ok(Feature::Container {
        name: element_name(element),
        children: convert_children(element)?,
    })
}

fn convert_placemark(element: &Element) -> Result<Feature, ParseError> {
    let mut geometry = None;
    for child in &element.children {
        if let Some(parsed) = convert_geometry(child)? {
            geometry = Some(parsed);
            break;
        }
    }
    Ok(Feature::Placemark {
        name: element_name(element),
        geometry,
    })
}

fn convert_geometry(element: &Element) -> Result<Option<PlacemarkGeometry>, ParseError> {
    let geometry = match element.name.as_str() {
        "LineString" => {
            let text = element
                .child("coordinates")
                .map(|c| c.text.as_str())
                .unwrap_or_default();
            PlacemarkGeometry::LineString(parse_coordinates(text, element.position)?)
        }
        "MultiGeometry" => {
            let mut parts = Vec::new();
            for child in &element.children {
                if let Some(part) = convert_geometry(child)? {
                    parts.push(part);
                }
            }
            PlacemarkGeometry::MultiGeometry(parts)
        }
        "Point" | "Polygon" | "LinearRing" | "Track" | "MultiTrack" | "Model" => {
            PlacemarkGeometry::Other(element.name.clone())
        }
        _ => return Ok(None),
    };
    Ok(Some(geometry))
}

fn element_name(element: &Element) -> Option<String> {
    element
        .child("name")
        .map(|n| n.text.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// `lon,lat[,alt]` tuples separated by whitespace
fn parse_coordinates(text: &str, position: u64) -> Result<LineString<f64>, ParseError> {
    let mut coords = Vec::new();
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        let x = parse_ordinate(parts.next(), tuple, position)?;
        let y = parse_ordinate(parts.next(), tuple, position)?;
        coords.push(Coord { x, y });
    }
    Ok(LineString::new(coords))
}

fn parse_ordinate(part: Option<&str>, tuple: &str, position: u64) -> Result<f64, ParseError> {
    part.and_then(|p| p.trim().parse::<f64>().ok())
        .ok_or_else(|| ParseError::new(format!("invalid coordinate tuple '{}'", tuple), position))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Route</name>
    <Placemark>
      <name>Segment A</name>
      <LineString><coordinates>-100,35,0 -99,36,0</coordinates></LineString>
    </Placemark>
    <Folder>
      <name>Branches</name>
      <Folder>
        <Placemark>
          <name>Segment B</name>
          <MultiGeometry>
            <LineString><coordinates>-98,34 -97,33</coordinates></LineString>
            <LineString><coordinates>-96,32 -95,31</coordinates></LineString>
          </MultiGeometry>
        </Placemark>
      </Folder>
      <Placemark>
        <name>Hut</name>
        <Point><coordinates>-94,30</coordinates></Point>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    #[test]
    fn test_parse_nested_tree() {
        let tree = FeatureTree::parse(NESTED).unwrap();
        assert_eq!(tree.features().len(), 1);
        match &tree.features()[0] {
            Feature::Container { name, children } => {
                assert_eq!(name.as_deref(), Some("Route"));
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected container, got {:?}", other),
        }
    }

    #[test]
    fn test_line_strings_flatten_in_document_order() {
        let tree = FeatureTree::parse(NESTED).unwrap();
        let lines: Vec<_> = tree.line_strings().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].0[0], Coord { x: -100.0, y: 35.0 });
        assert_eq!(lines[1].0[0], Coord { x: -98.0, y: 34.0 });
        assert_eq!(lines[2].0[1], Coord { x: -95.0, y: 31.0 });
    }

    #[test]
    fn test_point_placemarks_are_skipped() {
        let xml = r#"<kml><Placemark><Point><coordinates>1,2</coordinates></Point></Placemark></kml>"#;
        let tree = FeatureTree::parse(xml).unwrap();
        assert_eq!(tree.features().len(), 1);
        assert_eq!(tree.line_strings().count(), 0);
    }

    #[test]
    fn test_unclosed_document_is_parse_error() {
        let xml = "<kml><Document><Placemark><LineString>";
        let err = FeatureTree::parse(xml).unwrap_err();
        assert!(err.message.contains("not closed"));
    }

    #[test]
    fn test_mismatched_tags_are_parse_error() {
        let xml = "<kml><Document></Folder></kml>";
        assert!(FeatureTree::parse(xml).is_err());
    }

    #[test]
    fn test_plain_text_is_parse_error() {
        assert!(FeatureTree::parse("this is not a map document").is_err());
        assert!(FeatureTree::parse("").is_err());
    }

    #[test]
    fn test_bad_coordinates_are_parse_error() {
        let xml = r#"<kml><Placemark><LineString><coordinates>1,2 abc,4</coordinates></LineString></Placemark></kml>"#;
        let err = FeatureTree::parse(xml).unwrap_err();
        assert!(err.message.contains("abc,4"));
    }

    #[test]
    fn test_partial_tree_walk() {
        let xml = r#"<kml><Document>
            <Folder></Folder>
            <Placemark><name>empty</name></Placemark>
            <Placemark><LineString><coordinates>0,0 1,1</coordinates></LineString></Placemark>
        </Document></kml>"#;
        let tree = FeatureTree::parse(xml).unwrap();
        let mut lines = tree.line_strings();
        assert!(lines.next().is_some());
        assert!(lines.next().is_none());
        assert!(lines.next().is_none());
    }
}
