use crate::constants::{
    FIRST_MASTER_ID, FIRST_SLIDE_ID, RELS_NAMESPACE, SLIDE_MASTER_REL, SLIDE_REL,
};
use crate::package::Package;
use crate::parse_rels::{relative_target, resolve_target, Relationships};
use crate::xml_tree::{XmlDocument, XmlElement};
use crate::{Error, Result};

/// A slide as listed in the presentation's slide-id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRef {
    /// Numeric `p:sldId/@id`.
    pub id: u32,
    /// Relationship ID owned by the presentation part.
    pub rel_id: String,
    /// Package path of the slide part.
    pub part: String,
}

/// Mutable handle over a presentation package.
///
/// The presentation part and its relationships are kept parsed for the whole lifetime of
/// the handle and written back by [`Deck::flush`] / [`Deck::into_package`].
#[derive(Debug)]
pub struct Deck {
    package: Package,
    presentation_part: String,
    presentation: XmlDocument,
    rels: Relationships,
    rel_prefix: String,
}

impl Deck {
    pub fn open(package: Package) -> Result<Self> {
        let presentation_part = package.main_document_part()?;
        let mut presentation = package.xml_part(&presentation_part)?;
        let rels = package.relationships(&presentation_part)?;

        let rel_prefix = match presentation.root.prefix_for(RELS_NAMESPACE) {
            Some(prefix) => prefix.to_string(),
            None => {
                presentation.root.set_attr("xmlns:r", RELS_NAMESPACE);
                "r".to_string()
            }
        };

        Ok(Self { package, presentation_part, presentation, rels, rel_prefix })
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }

    pub fn presentation_part(&self) -> &str {
        &self.presentation_part
    }

    /// Writes the presentation part and its relationships back into the package.
    pub fn flush(&mut self) {
        self.package.set_xml_part(&self.presentation_part, &self.presentation);
        self.package.set_relationships(&self.presentation_part, &self.rels);
    }

    pub fn into_package(mut self) -> Package {
        self.flush();
        self.package
    }

    fn rel_id_key(&self) -> String {
        format!("{}:id", self.rel_prefix)
    }

    /// Slides in presentation order.
    pub fn slides(&self) -> Result<Vec<SlideRef>> {
        list_slides(
            &self.presentation.root,
            &self.rels,
            &self.presentation_part,
            &self.rel_id_key(),
        )
    }

    pub fn load_slide(&self, slide: &SlideRef) -> Result<XmlDocument> {
        self.package.xml_part(&slide.part)
    }

    pub fn store_slide(&mut self, slide: &SlideRef, doc: &XmlDocument) {
        self.package.set_xml_part(&slide.part, doc);
    }

    /// One past the highest slide id, or the first valid id for an empty deck.
    pub fn next_slide_id(&self) -> Result<u32> {
        match self.slides()?.iter().map(|s| s.id).max() {
            Some(max) => following_id(max, "slide"),
            None => Ok(FIRST_SLIDE_ID),
        }
    }

    /// Links an existing slide part from the presentation and lists it at `position`
    /// (appended when `None` or past the end).
    pub fn insert_slide(&mut self, part: &str, position: Option<usize>) -> Result<SlideRef> {
        let id = self.next_slide_id()?;
        let rel_id = self
            .rels
            .add(SLIDE_REL, &relative_target(&self.presentation_part, part));

        let entry = XmlElement::new("p:sldId")
            .with_attr("id", id.to_string())
            .with_attr(self.rel_id_key(), rel_id.clone());

        let list = self.slide_id_list_mut()?;
        let slot = slot_index(list, "p:sldId", position);
        list.insert_child(slot, entry);

        Ok(SlideRef { id, rel_id, part: part.to_string() })
    }

    /// Unlists a slide and deletes its part from the package.
    pub fn remove_slide(&mut self, slide: &SlideRef) {
        let key = self.rel_id_key();
        if let Some(list) = self.presentation.root.child_mut("p:sldIdLst") {
            list.remove_children_where(|el| {
                el.name == "p:sldId" && el.attr(&key) == Some(slide.rel_id.as_str())
            });
        }
        self.rels.remove(&slide.rel_id);
        self.package.remove_part(&slide.part);
    }

    /// Slide master parts in `p:sldMasterIdLst` order.
    pub fn masters(&self) -> Result<Vec<String>> {
        let key = self.rel_id_key();
        let mut masters = Vec::new();
        if let Some(list) = self.presentation.root.child("p:sldMasterIdLst") {
            for entry in list.elements().filter(|el| el.name == "p:sldMasterId") {
                if let Some(rel) = entry.attr(&key).and_then(|id| self.rels.get(id)) {
                    masters.push(resolve_target(&self.presentation_part, &rel.target));
                }
            }
        }
        Ok(masters)
    }

    /// Lists a slide master that was copied into the package.
    ///
    /// The master id and the ids of its `p:sldLayoutIdLst` share one space across the
    /// presentation, so the new master takes the next free id and its layouts are
    /// renumbered right after it.
    pub fn register_master(&mut self, master_part: &str) -> Result<u32> {
        let key = self.rel_id_key();
        let existing_rel = self
            .rels
            .of_type(SLIDE_MASTER_REL)
            .find(|rel| resolve_target(&self.presentation_part, &rel.target) == master_part)
            .map(|rel| rel.id.clone());

        if let Some(rel_id) = &existing_rel {
            let listed = self
                .presentation
                .root
                .child("p:sldMasterIdLst")
                .and_then(|list| {
                    list.elements()
                        .find(|el| el.attr(&key) == Some(rel_id.as_str()))
                        .and_then(|el| el.attr("id"))
                        .and_then(|id| id.parse::<u32>().ok())
                });
            if let Some(id) = listed {
                return Ok(id);
            }
        }

        let mut highest: Option<u32> = None;
        if let Some(list) = self.presentation.root.child("p:sldMasterIdLst") {
            for id in list.elements().filter_map(|el| el.attr("id")?.parse::<u32>().ok()) {
                highest = highest.max(Some(id));
            }
        }
        for part in self.masters()? {
            if part == master_part {
                continue;
            }
            let master = self.package.xml_part(&part)?;
            if let Some(list) = master.root.child("p:sldLayoutIdLst") {
                for id in list.elements().filter_map(|el| el.attr("id")?.parse::<u32>().ok()) {
                    highest = highest.max(Some(id));
                }
            }
        }
        let master_id = match highest {
            Some(max) => following_id(max, "slide master")?,
            None => FIRST_MASTER_ID,
        };

        let mut master = self.package.xml_part(master_part)?;
        if let Some(list) = master.root.child_mut("p:sldLayoutIdLst") {
            let mut next = master_id;
            for entry in list.elements_mut().filter(|el| el.name == "p:sldLayoutId") {
                next = following_id(next, "slide layout")?;
                entry.set_attr("id", next.to_string());
            }
        }
        self.package.set_xml_part(master_part, &master);

        let rel_id = match existing_rel {
            Some(rel_id) => rel_id,
            None => self
                .rels
                .add(SLIDE_MASTER_REL, &relative_target(&self.presentation_part, master_part)),
        };

        let entry = XmlElement::new("p:sldMasterId")
            .with_attr("id", master_id.to_string())
            .with_attr(key, rel_id);
        self.master_id_list_mut()?.push_child(entry);

        Ok(master_id)
    }

    fn slide_id_list_mut(&mut self) -> Result<&mut XmlElement> {
        let root = &mut self.presentation.root;
        if root.position_of("p:sldIdLst").is_none() {
            // CT_Presentation: the slide list follows the master lists
            let index = ["p:sldMasterIdLst", "p:notesMasterIdLst", "p:handoutMasterIdLst"]
                .iter()
                .filter_map(|tag| root.position_of(tag))
                .max()
                .map(|i| i + 1)
                .unwrap_or(0);
            root.insert_child(index, XmlElement::new("p:sldIdLst"));
        }
        root.child_mut("p:sldIdLst")
            .ok_or_else(|| Error::Integrity("presentation has no slide list".to_string()))
    }

    fn master_id_list_mut(&mut self) -> Result<&mut XmlElement> {
        let root = &mut self.presentation.root;
        if root.position_of("p:sldMasterIdLst").is_none() {
            root.insert_child(0, XmlElement::new("p:sldMasterIdLst"));
        }
        root.child_mut("p:sldMasterIdLst")
            .ok_or_else(|| Error::Integrity("presentation has no master list".to_string()))
    }
}

/// Slide part names of a package, in presentation order, without taking ownership of it.
pub fn slide_parts(package: &Package) -> Result<Vec<String>> {
    let presentation_part = package.main_document_part()?;
    let presentation = package.xml_part(&presentation_part)?;
    let rels = package.relationships(&presentation_part)?;
    let key = format!("{}:id", presentation.root.prefix_for(RELS_NAMESPACE).unwrap_or("r"));
    Ok(list_slides(&presentation.root, &rels, &presentation_part, &key)?
        .into_iter()
        .map(|slide| slide.part)
        .collect())
}

fn list_slides(
    presentation: &XmlElement,
    rels: &Relationships,
    presentation_part: &str,
    rel_id_key: &str,
) -> Result<Vec<SlideRef>> {
    let list = match presentation.child("p:sldIdLst") {
        Some(list) => list,
        None => return Ok(Vec::new()),
    };

    list.elements()
        .filter(|el| el.name == "p:sldId")
        .map(|el| {
            let id = el
                .attr("id")
                .and_then(|id| id.parse::<u32>().ok())
                .ok_or_else(|| Error::Integrity("slide id without numeric id".to_string()))?;
            let rel_id = el
                .attr(rel_id_key)
                .ok_or_else(|| Error::Integrity(format!("slide {} has no relationship", id)))?;
            let rel = rels.get(rel_id).ok_or_else(|| {
                Error::Integrity(format!("slide relationship {} is dangling", rel_id))
            })?;
            Ok(SlideRef {
                id,
                rel_id: rel_id.to_string(),
                part: resolve_target(presentation_part, &rel.target),
            })
        })
        .collect()
}

/// Index within `list.children` at which the `position`-th element named `name` should go.
fn slot_index(list: &XmlElement, name: &str, position: Option<usize>) -> usize {
    let positions: Vec<usize> = list
        .children
        .iter()
        .enumerate()
        .filter(|(_, node)| matches!(node, crate::xml_tree::XmlNode::Element(el) if el.name == name))
        .map(|(i, _)| i)
        .collect();
    match position {
        Some(p) if p < positions.len() => positions[p],
        _ => positions.last().map(|i| i + 1).unwrap_or(list.children.len()),
    }
}

/// The id after `id`, failing when the deck already uses the top of the id space.
fn following_id(id: u32, what: &str) -> Result<u32> {
    id.checked_add(1)
        .ok_or_else(|| Error::Integrity(format!("no {what} id left after {id}")))
}
