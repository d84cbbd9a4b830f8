use crate::constants::{SLIDE_LAYOUT_REL, SLIDE_MASTER_REL};
use crate::deck::{slide_parts, Deck, SlideRef};
use crate::footer::{apply_footer_overlay, has_footer_overlap};
use crate::layout::{layout_type, register_copied_masters, related_part, unify_layouts};
use crate::merger_config::MergerConfig;
use crate::package::Package;
use crate::part_copy::PartCopier;
use crate::slide::{
    apply_page_numbering, area_color, replace_area, replace_text, replace_text_color, run_color,
    slide_contains_text, tag_role, tagged_role,
};
use crate::types::{MergeRequest, SlideRole};
use crate::xml_tree::XmlDocument;
use crate::{Error, Result};

/// Template slide that holds the reference content layout.
const REFERENCE_SLIDE_INDEX: usize = 2;
const MIN_TEMPLATE_SLIDES: usize = 4;

/// What an assembly run did to the deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Roles whose slide was missing and got inserted.
    pub inserted: Vec<SlideRole>,
    /// Roles whose existing slide was built for another request and got replaced.
    pub refreshed: Vec<SlideRole>,
    /// Roles already satisfied by the deck.
    pub skipped: Vec<SlideRole>,
    pub layout_reused: bool,
    pub relinked_slides: usize,
    pub overlaid_slides: usize,
    pub numbered_slides: usize,
}

/// A role slide already present in the deck.
struct Existing {
    slide: SlideRef,
    /// Whether the slide carries the role tag, i.e. was inserted by an earlier run.
    tagged: bool,
    /// Whether the slide carries every value its role needs. Always true for the head
    /// slides, which are found by their text marker.
    complete: bool,
    /// Whether the slide already carries this request's theme color.
    themed: bool,
}

impl Existing {
    /// Incomplete slides are always replaced; a theme mismatch only when `refresh_stale`.
    fn keep(&self, refresh_stale: bool) -> bool {
        self.complete && (self.themed || !refresh_stale)
    }
}

/// Splices the template's cover, copyright and closing slides around a deck.
///
/// The template package is only read. Everything taken from it goes through one
/// [`PartCopier`] per [`DeckAssembler::assemble`] call, so each template part lands in
/// the deck at most once per run.
pub struct DeckAssembler<'a> {
    config: &'a MergerConfig,
    template: &'a Package,
    template_slides: Vec<String>,
}

impl<'a> DeckAssembler<'a> {
    /// # Errors
    ///
    /// [`Error::Template`] when the template has fewer than four slides (cover, copyright,
    /// reference content slide, closing).
    pub fn new(config: &'a MergerConfig, template: &'a Package) -> Result<Self> {
        let template_slides = slide_parts(template)?;
        if template_slides.len() < MIN_TEMPLATE_SLIDES {
            return Err(Error::Template(format!(
                "template has {} slides, at least {} are required",
                template_slides.len(),
                MIN_TEMPLATE_SLIDES
            )));
        }
        Ok(Self { config, template, template_slides })
    }

    fn template_slide(&self, role: SlideRole) -> &str {
        match role {
            SlideRole::Cover => &self.template_slides[0],
            SlideRole::Copyright => &self.template_slides[1],
            SlideRole::Closing => &self.template_slides[self.template_slides.len() - 1],
        }
    }

    /// Runs the whole transformation on `deck`, in order: cover, copyright and closing
    /// slides, layout unification of the interior slides, footer overlay and page
    /// numbering. The presentation part is flushed into the package at the end.
    pub fn assemble(&self, deck: &mut Deck, request: &MergeRequest) -> Result<AssemblyReport> {
        let mut copier = PartCopier::new(self.template);
        let mut report = AssemblyReport::default();
        let mut role_parts = Vec::with_capacity(3);

        for role in [SlideRole::Cover, SlideRole::Copyright] {
            let existing = self.find_head_slide(deck, role, request)?;
            let slide = self.settle(deck, &mut copier, role, existing, request, &mut report)?;
            role_parts.push(slide.part);
        }

        let existing = self.find_closing_slide(deck, &role_parts, request)?;
        let closing =
            self.settle(deck, &mut copier, SlideRole::Closing, existing, request, &mut report)?;
        role_parts.push(closing.part);

        register_copied_masters(deck, &copier)?;

        let interior: Vec<SlideRef> = deck
            .slides()?
            .into_iter()
            .filter(|slide| !role_parts.contains(&slide.part))
            .collect();

        let unified = unify_layouts(
            deck,
            &mut copier,
            &self.template_slides[REFERENCE_SLIDE_INDEX],
            &interior,
        )?;
        register_copied_masters(deck, &copier)?;
        report.layout_reused = unified.reused;
        report.relinked_slides = interior.len();

        if self.config.apply_footer_overlay {
            for slide in &interior {
                let doc = deck.load_slide(slide)?;
                if !has_footer_overlap(&doc, self.config.footer_start_emu) {
                    continue;
                }
                apply_footer_overlay(
                    deck,
                    slide,
                    &mut copier,
                    &unified.template_master,
                    self.config.footer_start_emu,
                )?;
                report.overlaid_slides += 1;
            }
        }

        report.numbered_slides =
            apply_page_numbering(deck, &self.config.markers.page_number_token)?;
        deck.flush();

        tracing::info!(
            inserted = report.inserted.len(),
            refreshed = report.refreshed.len(),
            skipped = report.skipped.len(),
            interior = report.relinked_slides,
            overlaid = report.overlaid_slides,
            "deck assembled"
        );
        Ok(report)
    }

    /// Keeps, replaces or inserts the slide of one role.
    fn settle(
        &self,
        deck: &mut Deck,
        copier: &mut PartCopier,
        role: SlideRole,
        existing: Option<Existing>,
        request: &MergeRequest,
        report: &mut AssemblyReport,
    ) -> Result<SlideRef> {
        let refreshing = existing.is_some();
        if let Some(existing) = existing {
            if existing.keep(self.config.refresh_stale_theme) {
                tracing::info!(role = %role, slide = %existing.slide.part, "slide already present");
                report.skipped.push(role);
                return Ok(existing.slide);
            }
            if existing.complete {
                tracing::info!(role = %role, slide = %existing.slide.part, "replacing slide built for another request");
            } else {
                tracing::warn!(role = %role, slide = %existing.slide.part, "replacing incomplete slide");
            }
            if existing.tagged {
                self.reuse_layout_of(deck, copier, role, &existing.slide)?;
            }
            deck.remove_slide(&existing.slide);
        }

        let part = copier.copy_part(self.template_slide(role), deck.package_mut())?;
        let mut doc = deck.package().xml_part(&part)?;
        self.personalize(&mut doc, role, request);
        deck.package_mut().set_xml_part(&part, &doc);

        let position = match role {
            SlideRole::Cover => Some(0),
            SlideRole::Copyright => Some(1),
            SlideRole::Closing => None,
        };
        let slide = deck.insert_slide(&part, position)?;
        tracing::debug!(role = %role, slide = %slide.part, id = slide.id, "inserted template slide");

        if refreshing {
            report.refreshed.push(role);
        } else {
            report.inserted.push(role);
        }
        Ok(slide)
    }

    /// Points the copier at the layout and master an outgoing role slide uses, so its
    /// replacement does not bring a second copy of the template master.
    fn reuse_layout_of(
        &self,
        deck: &Deck,
        copier: &mut PartCopier,
        role: SlideRole,
        outgoing: &SlideRef,
    ) -> Result<()> {
        let package = deck.package();
        let source_layout = related_part(self.template, self.template_slide(role), SLIDE_LAYOUT_REL)?;
        let dest_layout = related_part(package, &outgoing.part, SLIDE_LAYOUT_REL)?;
        let (source_layout, dest_layout) = match (source_layout, dest_layout) {
            (Some(source), Some(dest)) if package.contains(&dest) => (source, dest),
            _ => return Ok(()),
        };
        if layout_type(self.template, &source_layout)? != layout_type(package, &dest_layout)? {
            return Ok(());
        }

        copier.seed(&source_layout, &dest_layout);
        let source_master = related_part(self.template, &source_layout, SLIDE_MASTER_REL)?;
        let dest_master = related_part(package, &dest_layout, SLIDE_MASTER_REL)?;
        if let (Some(source), Some(dest)) = (source_master, dest_master) {
            copier.seed(&source, &dest);
        }
        Ok(())
    }

    fn personalize(&self, doc: &mut XmlDocument, role: SlideRole, request: &MergeRequest) {
        let markers = &self.config.markers;
        let theme = request.theme_hex();
        let professor = format!("{}{}", markers.professor_prefix, request.professor_name);

        match role {
            SlideRole::Cover | SlideRole::Copyright => {
                // color first, the placeholder is the only reliable marker
                replace_text_color(doc, &markers.course_placeholder, &theme);
                replace_text(doc, &markers.course_placeholder, &request.course_name.to_uppercase());
                replace_text(doc, &markers.lesson_title_placeholder, &request.lesson_title);
                replace_text(doc, &markers.professor_placeholder, &professor);
                replace_area(doc, &markers.copyright_phrase, &theme);
            }
            SlideRole::Closing => {
                replace_text(doc, &markers.professor_placeholder, &professor);
                replace_text_color(doc, &markers.linkedin_placeholder, &theme);
                replace_text(doc, &markers.linkedin_placeholder, &request.linkedin_handle);
            }
        }
        tag_role(doc, role);
    }

    /// Cover or copyright slide of the deck: the slide tagged with the role, otherwise
    /// the first untagged slide carrying the role's text marker.
    fn find_head_slide(
        &self,
        deck: &Deck,
        role: SlideRole,
        request: &MergeRequest,
    ) -> Result<Option<Existing>> {
        let course = request.course_name.to_uppercase();
        let marker = match role {
            SlideRole::Cover => course.as_str(),
            _ => self.config.markers.copyright_phrase.as_str(),
        };

        let mut found = None;
        for slide in deck.slides()? {
            let doc = deck.load_slide(&slide)?;
            match tagged_role(&doc) {
                Some(tagged) if tagged == role => {
                    found = Some((slide, doc, true));
                    break;
                }
                Some(_) => continue,
                None if found.is_none() && slide_contains_text(&doc, marker) => {
                    found = Some((slide, doc, false));
                }
                None => {}
            }
        }

        let theme = request.theme_hex();
        Ok(found.map(|(slide, doc, tagged)| {
            let color = match role {
                SlideRole::Cover => run_color(&doc, &course),
                _ => area_color(&doc, &self.config.markers.copyright_phrase),
            };
            Existing { slide, tagged, complete: true, themed: same_color(color, &theme) }
        }))
    }

    /// Closing slide of the deck: the slide tagged as closing, otherwise the last slide
    /// outside the head when it carries the closing phrase or the LinkedIn handle.
    ///
    /// The slide is complete when it names this request's professor and LinkedIn handle
    /// next to the closing phrase, and themed when the handle has the theme color.
    fn find_closing_slide(
        &self,
        deck: &Deck,
        head: &[String],
        request: &MergeRequest,
    ) -> Result<Option<Existing>> {
        let markers = &self.config.markers;
        let mut candidate = None;
        let mut last_untagged = None;

        for slide in deck.slides()? {
            if head.contains(&slide.part) {
                continue;
            }
            let doc = deck.load_slide(&slide)?;
            match tagged_role(&doc) {
                Some(SlideRole::Closing) => {
                    candidate = Some((slide, doc, true));
                    break;
                }
                Some(_) => {}
                None => last_untagged = Some((slide, doc, false)),
            }
        }

        let candidate = candidate.or_else(|| {
            last_untagged.filter(|(_, doc, _)| {
                slide_contains_text(doc, &markers.closing_phrase)
                    || slide_contains_text(doc, &request.linkedin_handle)
            })
        });

        Ok(candidate.map(|(slide, doc, tagged)| {
            let complete = slide_contains_text(&doc, &request.professor_name)
                && slide_contains_text(&doc, &request.linkedin_handle)
                && slide_contains_text(&doc, &markers.closing_phrase);
            let themed = same_color(run_color(&doc, &request.linkedin_handle), &request.theme_hex());
            Existing { slide, tagged, complete, themed }
        }))
    }
}

fn same_color(color: Option<String>, theme: &str) -> bool {
    color.map(|c| c.eq_ignore_ascii_case(theme)).unwrap_or(false)
}
