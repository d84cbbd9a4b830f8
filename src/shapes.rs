use crate::types::Transform;
use crate::xml_tree::{XmlElement, XmlNode};

/// The four kinds of drawable that sit directly in a shape tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Shape,
    Picture,
    GroupShape,
    GraphicFrame,
}

impl ShapeKind {
    pub fn from_tag(name: &str) -> Option<Self> {
        match name {
            "p:sp" => Some(ShapeKind::Shape),
            "p:pic" => Some(ShapeKind::Picture),
            "p:grpSp" => Some(ShapeKind::GroupShape),
            "p:graphicFrame" => Some(ShapeKind::GraphicFrame),
            _ => None,
        }
    }

    fn non_visual_tag(self) -> &'static str {
        match self {
            ShapeKind::Shape => "p:nvSpPr",
            ShapeKind::Picture => "p:nvPicPr",
            ShapeKind::GroupShape => "p:nvGrpSpPr",
            ShapeKind::GraphicFrame => "p:nvGraphicFramePr",
        }
    }
}

/// Uniform view of one drawable of a shape tree.
///
/// Every pass that looks at shapes (overlap detection, footer cloning) goes through
/// this view, so the per-kind differences in where the transform and the
/// non-visual properties live are handled in one place.
#[derive(Debug, Clone)]
pub struct VisualElement<'a> {
    pub kind: ShapeKind,
    /// Position of the element within the shape tree's `children`.
    pub index: usize,
    pub id: Option<u32>,
    pub name: String,
    /// `None` when the element inherits its position from the layout.
    pub transform: Option<Transform>,
    /// Placeholder type (`p:ph/@type`, `obj` when untyped) if this is a placeholder.
    pub placeholder: Option<String>,
    /// Relationship IDs referenced from anywhere inside the element.
    pub rel_refs: Vec<String>,
    pub node: &'a XmlElement,
}

impl VisualElement<'_> {
    pub fn y_offset(&self) -> Option<i64> {
        self.transform.map(|t| t.y)
    }

    pub fn height(&self) -> Option<i64> {
        self.transform.map(|t| t.cy)
    }
}

/// Shape tree (`p:cSld/p:spTree`) of a slide, layout or master root element.
pub fn shape_tree(root: &XmlElement) -> Option<&XmlElement> {
    root.child("p:cSld")?.child("p:spTree")
}

pub fn shape_tree_mut(root: &mut XmlElement) -> Option<&mut XmlElement> {
    root.child_mut("p:cSld")?.child_mut("p:spTree")
}

/// Lists the top-level drawables of a shape tree.
///
/// `rel_prefix` is the prefix the part binds to the relationships namespace (usually `r`).
/// Anything that is not one of the four [`ShapeKind`]s (content parts, alternate content,
/// connectors) is left out.
pub fn visual_elements<'a>(sp_tree: &'a XmlElement, rel_prefix: &str) -> Vec<VisualElement<'a>> {
    sp_tree
        .children
        .iter()
        .enumerate()
        .filter_map(|(index, node)| match node {
            XmlNode::Element(el) => describe(el, index, rel_prefix),
            _ => None,
        })
        .collect()
}

fn describe<'a>(node: &'a XmlElement, index: usize, rel_prefix: &str) -> Option<VisualElement<'a>> {
    let kind = ShapeKind::from_tag(&node.name)?;
    let non_visual = node.child(kind.non_visual_tag());
    let c_nv_pr = non_visual.and_then(|nv| nv.child("p:cNvPr"));

    let placeholder = non_visual
        .and_then(|nv| nv.child("p:nvPr"))
        .and_then(|nv_pr| nv_pr.child("p:ph"))
        .map(|ph| ph.attr("type").unwrap_or("obj").to_string());

    Some(VisualElement {
        kind,
        index,
        id: c_nv_pr.and_then(|c| c.attr("id")).and_then(|id| id.parse().ok()),
        name: c_nv_pr.and_then(|c| c.attr("name")).unwrap_or_default().to_string(),
        transform: transform_of(node, kind),
        placeholder,
        rel_refs: rel_refs(node, rel_prefix),
        node,
    })
}

fn transform_of(node: &XmlElement, kind: ShapeKind) -> Option<Transform> {
    let xfrm = match kind {
        ShapeKind::Shape | ShapeKind::Picture => node.child("p:spPr")?.child("a:xfrm")?,
        ShapeKind::GroupShape => node.child("p:grpSpPr")?.child("a:xfrm")?,
        ShapeKind::GraphicFrame => node.child("p:xfrm")?,
    };
    let off = xfrm.child("a:off")?;
    let ext = xfrm.child("a:ext")?;
    Some(Transform {
        x: off.attr("x")?.parse().ok()?,
        y: off.attr("y")?.parse().ok()?,
        cx: ext.attr("cx")?.parse().ok()?,
        cy: ext.attr("cy")?.parse().ok()?,
    })
}

/// Every value of an attribute in the relationships namespace below `node`, deduplicated
/// in first-seen order.
pub fn rel_refs(node: &XmlElement, rel_prefix: &str) -> Vec<String> {
    let qualifier = format!("{}:", rel_prefix);
    let mut refs: Vec<String> = Vec::new();
    for el in node.descendants() {
        for (key, value) in &el.attributes {
            if key.starts_with(&qualifier) && !value.is_empty() && !refs.contains(value) {
                refs.push(value.clone());
            }
        }
    }
    refs
}
