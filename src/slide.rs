use crate::constants::ROLE_TAG_PREFIX;
use crate::deck::Deck;
use crate::types::{normalize_hex, SlideRole};
use crate::xml_tree::{XmlDocument, XmlElement};
use crate::Result;

/// DrawingML fill choices; a properties element holds at most one of them.
const FILL_TAGS: [&str; 6] = [
    "a:noFill",
    "a:solidFill",
    "a:gradFill",
    "a:blipFill",
    "a:pattFill",
    "a:grpFill",
];

/// Replaces every occurrence of `old_text` inside each text node (`<a:t>`) of the slide.
///
/// Matching is per text node and by substring, so `"NOMEMBA"` inside
/// `"MBA EM NOMEMBA"` is replaced while the rest of the run is kept. Text nodes without
/// a match are not touched.
///
/// # Returns
///
/// The number of text nodes that changed.
pub fn replace_text(slide: &mut XmlDocument, old_text: &str, new_text: &str) -> usize {
    if old_text.is_empty() {
        return 0;
    }
    let mut changed = 0;
    slide.root.visit_mut(&mut |el| {
        if el.name != "a:t" {
            return;
        }
        let text = el.text();
        if text.contains(old_text) {
            el.set_text(text.replace(old_text, new_text));
            changed += 1;
        }
    });
    changed
}

/// Sets the solid fill of every run (`<a:r>`) whose text contains `marker` to `hex_color`.
///
/// The run properties are created when missing. Text nodes whose parent is not a run
/// (for example `<a:fld>` fields) are skipped and logged.
pub fn replace_text_color(slide: &mut XmlDocument, marker: &str, hex_color: &str) -> usize {
    if marker.is_empty() {
        return 0;
    }
    let hex = normalize_hex(hex_color);
    let mut changed = 0;
    slide.root.visit_mut(&mut |el| {
        let hit = el
            .elements()
            .any(|child| child.name == "a:t" && child.text().contains(marker));
        if !hit {
            return;
        }
        if el.name == "a:r" {
            set_run_fill(el, &hex);
            changed += 1;
        } else {
            tracing::debug!(parent = %el.name, marker, "marker text is not inside a run, color left unchanged");
        }
    });
    changed
}

/// Sets the background fill of every shape (`<p:sp>`) whose whole text body contains `marker`.
pub fn replace_area(slide: &mut XmlDocument, marker: &str, hex_color: &str) -> usize {
    if marker.is_empty() {
        return 0;
    }
    let hex = normalize_hex(hex_color);
    let mut changed = 0;
    slide.root.visit_mut(&mut |el| {
        if el.name != "p:sp" {
            return;
        }
        let hit = el
            .child("p:txBody")
            .map(|body| body.text().contains(marker))
            .unwrap_or(false);
        if hit {
            set_shape_fill(el, &hex);
            changed += 1;
        }
    });
    changed
}

/// Whether any text node of the slide contains `marker`.
pub fn slide_contains_text(slide: &XmlDocument, marker: &str) -> bool {
    !marker.is_empty()
        && slide
            .root
            .descendants()
            .any(|el| el.name == "a:t" && el.text().contains(marker))
}

/// Writes each slide's 1-based position over the page-number token.
///
/// Only slides whose text physically carries `token` change; slides without it are not
/// rewritten.
pub fn apply_page_numbering(deck: &mut Deck, token: &str) -> Result<usize> {
    let mut numbered = 0;
    for (index, slide_ref) in deck.slides()?.into_iter().enumerate() {
        let mut slide = deck.load_slide(&slide_ref)?;
        if replace_text(&mut slide, token, &(index + 1).to_string()) > 0 {
            deck.store_slide(&slide_ref, &slide);
            numbered += 1;
        }
    }
    Ok(numbered)
}

/// Solid fill color of the first run whose text contains `marker`.
pub fn run_color(slide: &XmlDocument, marker: &str) -> Option<String> {
    slide
        .root
        .descendants()
        .filter(|el| el.name == "a:r")
        .find(|run| {
            run.elements()
                .any(|child| child.name == "a:t" && child.text().contains(marker))
        })
        .and_then(|run| run.child("a:rPr"))
        .and_then(solid_fill_hex)
}

/// Background fill color of the first shape whose text body contains `marker`.
pub fn area_color(slide: &XmlDocument, marker: &str) -> Option<String> {
    slide
        .root
        .descendants()
        .filter(|el| el.name == "p:sp")
        .find(|sp| {
            sp.child("p:txBody")
                .map(|body| body.text().contains(marker))
                .unwrap_or(false)
        })
        .and_then(|sp| sp.child("p:spPr"))
        .and_then(solid_fill_hex)
}

/// Role recorded on a slide by [`tag_role`].
pub fn tagged_role(slide: &XmlDocument) -> Option<SlideRole> {
    let name = slide.root.child("p:cSld")?.attr("name")?;
    match name.strip_prefix(ROLE_TAG_PREFIX)? {
        "cover" => Some(SlideRole::Cover),
        "copyright" => Some(SlideRole::Copyright),
        "closing" => Some(SlideRole::Closing),
        _ => None,
    }
}

pub fn tag_role(slide: &mut XmlDocument, role: SlideRole) {
    if let Some(c_sld) = slide.root.child_mut("p:cSld") {
        c_sld.set_attr("name", format!("{}{}", ROLE_TAG_PREFIX, role.tag()));
    }
}

fn solid_fill_hex(properties: &XmlElement) -> Option<String> {
    properties
        .child("a:solidFill")?
        .child("a:srgbClr")?
        .attr("val")
        .map(normalize_hex)
}

fn solid_fill(hex: &str) -> XmlElement {
    XmlElement::new("a:solidFill").with_child(XmlElement::new("a:srgbClr").with_attr("val", hex))
}

fn set_run_fill(run: &mut XmlElement, hex: &str) {
    if run.position_of("a:rPr").is_none() {
        run.insert_child(0, XmlElement::new("a:rPr"));
    }
    if let Some(r_pr) = run.child_mut("a:rPr") {
        r_pr.remove_children_where(|el| FILL_TAGS.contains(&el.name.as_str()));
        // the fill follows an optional <a:ln> and precedes everything else
        let index = r_pr.position_of("a:ln").map(|i| i + 1).unwrap_or(0);
        r_pr.insert_child(index, solid_fill(hex));
    }
}

fn set_shape_fill(sp: &mut XmlElement, hex: &str) {
    if sp.position_of("p:spPr").is_none() {
        let index = sp.position_of("p:nvSpPr").map(|i| i + 1).unwrap_or(0);
        sp.insert_child(index, XmlElement::new("p:spPr"));
    }
    if let Some(sp_pr) = sp.child_mut("p:spPr") {
        sp_pr.remove_children_where(|el| FILL_TAGS.contains(&el.name.as_str()));
        // geometry comes before the fill
        let index = ["a:xfrm", "a:custGeom", "a:prstGeom"]
            .iter()
            .filter_map(|tag| sp_pr.position_of(tag))
            .max()
            .map(|i| i + 1)
            .unwrap_or(0);
        sp_pr.insert_child(index, solid_fill(hex));
    }
}
