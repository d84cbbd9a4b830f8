use crate::constants::{SLIDE_LAYOUT_REL, SLIDE_MASTER_CONTENT_TYPE, SLIDE_MASTER_REL};
use crate::deck::{Deck, SlideRef};
use crate::package::Package;
use crate::parse_rels::{relative_target, resolve_target};
use crate::part_copy::PartCopier;
use crate::{Error, Result};

/// Layout every interior slide ends up referencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedLayout {
    /// `p:sldLayout/@type` of the template's reference layout (`default` when untyped).
    pub layout_type: String,
    /// Destination master owning [`UnifiedLayout::layout_part`].
    pub master_part: String,
    pub layout_part: String,
    /// Template master the reference layout belongs to (a source-package part).
    pub template_master: String,
    /// Whether a master already present in the destination was reused.
    pub reused: bool,
}

/// Layout type string of a layout part.
pub fn layout_type(package: &Package, layout_part: &str) -> Result<String> {
    let layout = package.xml_part(layout_part)?;
    Ok(layout.root.attr("type").unwrap_or("default").to_string())
}

/// First relationship target of `rel_type` owned by `part`.
pub fn related_part(package: &Package, part: &str, rel_type: &str) -> Result<Option<String>> {
    let rels = package.relationships(part)?;
    let target = rels
        .of_type(rel_type)
        .next()
        .map(|rel| resolve_target(part, &rel.target));
    Ok(target)
}

/// Makes every slide of `interior` use one layout, matching the layout of the template's
/// reference content slide.
///
/// A destination master that already owns a layout of the same type is reused. Otherwise
/// the template master is copied, together with its theme, fonts and all of its layouts,
/// and registered in the destination's master list.
///
/// # Errors
///
/// [`Error::Template`] when the reference slide has no layout or the layout no master.
pub fn unify_layouts(
    deck: &mut Deck,
    copier: &mut PartCopier,
    reference_slide: &str,
    interior: &[SlideRef],
) -> Result<UnifiedLayout> {
    let template = copier.source();
    let source_layout = related_part(template, reference_slide, SLIDE_LAYOUT_REL)?
        .ok_or_else(|| Error::Template(format!("{} has no slide layout", reference_slide)))?;
    let template_master = related_part(template, &source_layout, SLIDE_MASTER_REL)?
        .ok_or_else(|| Error::Template(format!("{} has no slide master", source_layout)))?;
    let wanted = layout_type(template, &source_layout)?;

    let (master_part, layout_part, reused) = match find_layout_of_type(deck, &wanted)? {
        Some((master, layout)) => {
            tracing::info!(layout_type = %wanted, master = %master, "reusing slide master already in the deck");
            (master, layout, true)
        }
        None => {
            let master = copier.copy_part(&template_master, deck.package_mut())?;
            deck.register_master(&master)?;
            let layout = match copier.destination_of(&source_layout) {
                Some(layout) => layout.to_string(),
                None => copier.copy_part(&source_layout, deck.package_mut())?,
            };
            tracing::info!(layout_type = %wanted, master = %master, "copied template slide master");
            (master, layout, false)
        }
    };

    for slide in interior {
        relink_layout(deck.package_mut(), &slide.part, &layout_part)?;
    }

    Ok(UnifiedLayout { layout_type: wanted, master_part, layout_part, template_master, reused })
}

/// Registers every slide master the copier has brought into the deck.
pub fn register_copied_masters(deck: &mut Deck, copier: &PartCopier) -> Result<()> {
    let mut masters: Vec<String> = copier
        .copied_parts()
        .map(|(_, dest)| dest.to_string())
        .filter(|dest| deck.package().content_type(dest) == Some(SLIDE_MASTER_CONTENT_TYPE))
        .collect();
    masters.sort();
    for master in masters {
        deck.register_master(&master)?;
    }
    Ok(())
}

fn find_layout_of_type(deck: &Deck, wanted: &str) -> Result<Option<(String, String)>> {
    let package = deck.package();
    for master in deck.masters()? {
        let rels = package.relationships(&master)?;
        for rel in rels.of_type(SLIDE_LAYOUT_REL) {
            let layout = resolve_target(&master, &rel.target);
            if package.contains(&layout) && layout_type(package, &layout)? == wanted {
                return Ok(Some((master, layout)));
            }
        }
    }
    Ok(None)
}

/// Replaces the layout relationship of a slide.
fn relink_layout(package: &mut Package, slide_part: &str, layout_part: &str) -> Result<()> {
    let mut rels = package.relationships(slide_part)?;
    rels.items.retain(|rel| rel.rel_type != SLIDE_LAYOUT_REL);
    rels.add(SLIDE_LAYOUT_REL, &relative_target(slide_part, layout_part));
    package.set_relationships(slide_part, &rels);
    Ok(())
}
