use crate::deck::{Deck, SlideRef};
use crate::part_copy::{rel_prefix_of, PartCopier, RelIdMap};
use crate::shapes::{rel_refs, shape_tree, shape_tree_mut, visual_elements, VisualElement};
use crate::xml_tree::{XmlDocument, XmlElement};
use crate::{Error, Result};

/// Name prefix of the master shapes cloned onto a slide by [`apply_footer_overlay`].
pub const OVERLAY_NAME_PREFIX: &str = "slide-merger-footer:";

const FOOTER_PLACEHOLDERS: [&str; 3] = ["dt", "ftr", "sldNum"];

/// Whether any drawable of the slide reaches into the footer band.
///
/// An element overlaps when `y + height >= footer_start` (inclusive). Elements without a
/// transform of their own cannot be tested and are ignored, as are the slide's own
/// footer placeholders and shapes previously overlaid by this crate. Groups are tested
/// by their own bounds only.
pub fn has_footer_overlap(slide: &XmlDocument, footer_start: i64) -> bool {
    let tree = match shape_tree(&slide.root) {
        Some(tree) => tree,
        None => return false,
    };
    let prefix = rel_prefix_of(&slide.root);
    visual_elements(tree, &prefix)
        .iter()
        .filter(|el| !is_footer_decoration(el))
        .filter_map(|el| el.transform)
        .any(|t| t.y_end() >= footer_start)
}

fn is_footer_decoration(element: &VisualElement) -> bool {
    element.name.starts_with(OVERLAY_NAME_PREFIX)
        || element
            .placeholder
            .as_deref()
            .map(|ph| FOOTER_PLACEHOLDERS.contains(&ph))
            .unwrap_or(false)
}

/// Appends copies of the template master's footer-band drawables to the end of a slide's
/// shape tree, so they draw above the slide content.
///
/// Only master elements whose own top edge is at or below `footer_start` are copied.
/// Each copy gets fresh `p:cNvPr` ids, images it embeds are copied into the destination
/// package and linked from the slide under new relationship IDs, and placeholder markers
/// are dropped so the copies do not compete with the slide's own placeholders. Copies
/// left by an earlier run are removed first.
///
/// # Returns
///
/// The number of drawables appended.
pub fn apply_footer_overlay(
    deck: &mut Deck,
    slide_ref: &SlideRef,
    copier: &mut PartCopier,
    template_master: &str,
    footer_start: i64,
) -> Result<usize> {
    let master = copier.source().xml_part(template_master)?;
    let master_tree = shape_tree(&master.root)
        .ok_or_else(|| Error::Template(format!("{} has no shape tree", template_master)))?;
    let master_prefix = rel_prefix_of(&master.root);

    let footer_elements: Vec<VisualElement> = visual_elements(master_tree, &master_prefix)
        .into_iter()
        .filter(|el| el.y_offset().map(|y| y >= footer_start).unwrap_or(false))
        .collect();

    let mut slide = deck.load_slide(slide_ref)?;
    let mut slide_rels = deck.package().relationships(&slide_ref.part)?;

    let slide_prefix = rel_prefix_of(&slide.root);
    let stale_refs = {
        let tree = shape_tree_mut(&mut slide.root)
            .ok_or_else(|| Error::Integrity(format!("{} has no shape tree", slide_ref.part)))?;
        let refs: Vec<String> = tree
            .elements()
            .filter(|el| is_overlay_clone(el))
            .flat_map(|el| rel_refs(el, &slide_prefix))
            .collect();
        tree.remove_children_where(is_overlay_clone);
        refs
    };
    if !stale_refs.is_empty() {
        let in_use = rel_refs(&slide.root, &slide_prefix);
        for rel_id in stale_refs.iter().filter(|id| !in_use.contains(id)) {
            slide_rels.remove(rel_id);
        }
    }
    let mut next_id = shape_tree(&slide.root).map(max_shape_id).unwrap_or(1) + 1;

    let mut clones = Vec::with_capacity(footer_elements.len());
    for element in &footer_elements {
        let mut clone = element.node.clone();

        let mut id_map = RelIdMap::default();
        for rel_id in &element.rel_refs {
            if let Some(new_id) = copier.copy_reference(
                template_master,
                rel_id,
                deck.package_mut(),
                &slide_ref.part,
                &mut slide_rels,
            )? {
                id_map.insert(rel_id.clone(), new_id);
            }
        }
        id_map.apply(&mut clone, &master_prefix);

        clone.visit_mut(&mut |el| {
            if el.name == "p:cNvPr" {
                let name = el.attr("name").unwrap_or_default().to_string();
                el.set_attr("id", next_id.to_string());
                el.set_attr("name", format!("{}{}", OVERLAY_NAME_PREFIX, name));
                next_id += 1;
            } else if el.name == "p:nvPr" {
                el.remove_children_where(|child| child.name == "p:ph");
            }
        });
        clones.push(clone);
    }

    let count = clones.len();
    if let Some(tree) = shape_tree_mut(&mut slide.root) {
        for clone in clones {
            tree.push_child(clone);
        }
    }

    deck.store_slide(slide_ref, &slide);
    deck.package_mut().set_relationships(&slide_ref.part, &slide_rels);
    tracing::debug!(slide = %slide_ref.part, overlaid = count, "footer overlay applied");
    Ok(count)
}

fn is_overlay_clone(element: &XmlElement) -> bool {
    element
        .descendants()
        .find(|d| d.name == "p:cNvPr")
        .and_then(|c| c.attr("name"))
        .map(|name| name.starts_with(OVERLAY_NAME_PREFIX))
        .unwrap_or(false)
}

fn max_shape_id(tree: &XmlElement) -> u32 {
    tree.descendants()
        .filter(|el| el.name == "p:cNvPr")
        .filter_map(|el| el.attr("id")?.parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}
