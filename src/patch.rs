use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use log::info;
use svg::node::element::Element;
use svg::Node;

/// Font applied to every text label as the final normalization pass.
const PATCH_FONT_FAMILY: &str = "Arial";

/// Marker shapes the patcher can produce. The rendering engine only ever
/// draws circles and axis-aligned squares; everything else is substituted
/// here by color-keyed matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Circle,
    Square,
    Triangle,
    Diamond,
    Pentagon,
}

impl FromStr for MarkerShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "circle" => Ok(MarkerShape::Circle),
            "square" => Ok(MarkerShape::Square),
            "triangle" => Ok(MarkerShape::Triangle),
            "diamond" => Ok(MarkerShape::Diamond),
            "pentagon" => Ok(MarkerShape::Pentagon),
            other => bail!(
                "unsupported marker shape {other:?}; expected circle, square, triangle, diamond or pentagon"
            ),
        }
    }
}

impl MarkerShape {
    /// Vertex positions for a marker centered on (cx, cy) with radius r.
    fn vertices(self, cx: f64, cy: f64, r: f64) -> Vec<(f64, f64)> {
        let at_angles = |angles: &[f64]| {
            angles
                .iter()
                .map(|deg| {
                    let rad = deg.to_radians();
                    (cx + r * rad.cos(), cy + r * rad.sin())
                })
                .collect()
        };
        match self {
            MarkerShape::Circle => Vec::new(),
            MarkerShape::Triangle => at_angles(&[-90.0, 30.0, 150.0]),
            MarkerShape::Diamond => at_angles(&[-90.0, 0.0, 90.0, 180.0]),
            MarkerShape::Pentagon => {
                let angles: Vec<f64> = (0..5).map(|i| -90.0 + 72.0 * i as f64).collect();
                at_angles(&angles)
            }
            MarkerShape::Square => {
                // deliberately smaller than the native square so relative
                // marker sizes stay comparable
                let half = 0.75 * r;
                vec![
                    (cx - half, cy - half),
                    (cx + half, cy - half),
                    (cx + half, cy + half),
                    (cx - half, cy + half),
                ]
            }
        }
    }
}

/// Patch the rendered vector image in place on disk.
pub fn patch_file(path: &Path, requests: &[(String, String)]) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read rendered image: {}", path.display()))?;
    let patched = patch_shapes(&raw, requests)?;
    fs::write(path, patched)
        .with_context(|| format!("failed to write patched image: {}", path.display()))
}

/// Pure transform from (vector image, color -> shape requests) to a new
/// vector image.
///
/// Every circle or rect primitive whose effective fill matches a requested
/// color is replaced by the requested polygon; text labels get a uniform
/// font family. Unsupported shape names abort before any rewriting.
pub fn patch_shapes(svg_text: &str, requests: &[(String, String)]) -> Result<String> {
    let mut by_color: HashMap<String, MarkerShape> = HashMap::new();
    for (color, shape_name) in requests {
        let shape: MarkerShape = shape_name.parse()?;
        // circles are native; nothing to rewrite
        if shape != MarkerShape::Circle {
            by_color.insert(normalize_color(color), shape);
        }
    }

    let doc = roxmltree::Document::parse(svg_text).context("failed to parse rendered SVG")?;
    let root = doc.root_element();

    let mut replaced = 0usize;
    let mut element = rebuild(root, &by_color, &mut replaced);

    // namespace declarations live on the document root
    for ns in root.namespaces() {
        match ns.name() {
            Some(prefix) => element.assign(format!("xmlns:{prefix}"), ns.uri()),
            None => element.assign("xmlns", ns.uri()),
        }
    }

    info!("shape patch replaced {replaced} marker(s)");
    Ok(element.to_string())
}

fn rebuild(
    node: roxmltree::Node<'_, '_>,
    by_color: &HashMap<String, MarkerShape>,
    replaced: &mut usize,
) -> Element {
    let tag = node.tag_name().name();

    if tag == "circle" || tag == "rect" {
        if let Some(fill) = effective_fill(node) {
            if let Some(&shape) = by_color.get(&normalize_color(&fill)) {
                if let Some(polygon) = replacement_polygon(node, shape) {
                    *replaced += 1;
                    return polygon;
                }
            }
        }
    }

    let mut element = Element::new(tag.to_string());
    for attr in node.attributes() {
        let mut value = attr.value().to_string();
        if tag == "text" && attr.name() == "style" {
            value = strip_style_property(&value, "font-family");
            if value.is_empty() {
                continue;
            }
        }
        element.assign(qualified_name(node, attr), value);
    }
    if tag == "text" {
        element.assign("font-family", PATCH_FONT_FAMILY);
    }

    for child in node.children() {
        if child.is_element() {
            element.append(rebuild(child, by_color, replaced));
        } else if let Some(text) = child.text() {
            if !text.trim().is_empty() {
                element.append(svg::node::Text::new(escape_text(text)));
            }
        }
    }

    element
}

/// Resolve the fill that actually paints `node`: its own declaration, else
/// the nearest ancestor that declares one (the renderer nests styling on a
/// wrapping group rather than the primitive itself).
fn effective_fill(node: roxmltree::Node<'_, '_>) -> Option<String> {
    for ancestor in node.ancestors().filter(|n| n.is_element()) {
        // inline style wins over the presentation attribute
        if let Some(style) = ancestor.attribute("style") {
            if let Some(fill) = style_property(style, "fill") {
                return Some(fill);
            }
        }
        if let Some(fill) = ancestor.attribute("fill") {
            return Some(fill.to_string());
        }
    }
    None
}

fn replacement_polygon(node: roxmltree::Node<'_, '_>, shape: MarkerShape) -> Option<Element> {
    let float_attr = |name: &str| node.attribute(name).and_then(|v| v.parse::<f64>().ok());

    let (cx, cy, r) = if node.tag_name().name() == "circle" {
        (float_attr("cx")?, float_attr("cy")?, float_attr("r")?)
    } else {
        let x = float_attr("x")?;
        let y = float_attr("y")?;
        let width = float_attr("width")?;
        let height = float_attr("height")?;
        (x + width / 2.0, y + height / 2.0, width / 2.0)
    };

    let points = shape
        .vertices(cx, cy, r)
        .iter()
        .map(|(x, y)| format!("{x:.4},{y:.4}"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut polygon = Element::new("polygon");
    polygon.assign("points", points);
    for attr in ["fill", "stroke", "stroke-width"] {
        if let Some(value) = node.attribute(attr) {
            polygon.assign(attr, value);
        }
    }
    Some(polygon)
}

fn qualified_name(node: roxmltree::Node<'_, '_>, attr: roxmltree::Attribute<'_, '_>) -> String {
    match attr.namespace() {
        Some(uri) => {
            let prefix = node
                .namespaces()
                .find(|ns| ns.uri() == uri)
                .and_then(|ns| ns.name());
            match prefix {
                Some(prefix) => format!("{prefix}:{}", attr.name()),
                None => attr.name().to_string(),
            }
        }
        None => attr.name().to_string(),
    }
}

fn normalize_color(color: &str) -> String {
    color.trim().to_ascii_lowercase()
}

fn style_property(style: &str, name: &str) -> Option<String> {
    style.split(';').find_map(|declaration| {
        let (key, value) = declaration.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

fn strip_style_property(style: &str, name: &str) -> String {
    style
        .split(';')
        .map(str::trim)
        .filter(|declaration| {
            !declaration.is_empty()
                && !declaration
                    .split_once(':')
                    .is_some_and(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
