#![allow(dead_code)]

use pptx_slide_merger::{Deck, MergeRequest, Package, SlideRef};
use std::io::{Cursor, Write};

pub const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_BASE: &str = "application/vnd.openxmlformats-officedocument";

pub const COVER_LOGO: &[u8] = &[0x89, b'P', b'N', b'G', 1];
pub const MASTER_LOGO: &[u8] = &[0x89, b'P', b'N', b'G', 2];

/// Zip entries plus content-type overrides of a package under construction.
#[derive(Default)]
pub struct PackageBuilder {
    parts: Vec<(String, Vec<u8>)>,
    overrides: Vec<(String, String)>,
}

impl PackageBuilder {
    pub fn xml(mut self, name: &str, content_type: &str, xml: &str) -> Self {
        let data = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n{}",
            xml
        );
        self.parts.push((name.to_string(), data.into_bytes()));
        if !content_type.is_empty() {
            self.overrides.push((name.to_string(), content_type.to_string()));
        }
        self
    }

    pub fn rels(self, owner: &str, rels: &[(&str, &str, &str)]) -> Self {
        let name = match owner.rsplit_once('/') {
            Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
            None => format!("_rels/{}.rels", owner),
        };
        let mut xml = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (id, kind, target) in rels {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
                id, REL_BASE, kind, target
            ));
        }
        xml.push_str("</Relationships>");
        self.xml(&name, "", &xml)
    }

    pub fn binary(mut self, name: &str, data: &[u8]) -> Self {
        self.parts.push((name.to_string(), data.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut content_types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>"#,
        );
        for (name, content_type) in &self.overrides {
            content_types.push_str(&format!(
                r#"<Override PartName="/{}" ContentType="{}"/>"#,
                name, content_type
            ));
        }
        content_types.push_str("</Types>");

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(content_types.as_bytes()).unwrap();
        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

fn ct(kind: &str) -> String {
    format!("{}.presentationml.{}+xml", CT_BASE, kind)
}

fn presentation_ct() -> String {
    format!("{}.presentationml.presentation.main+xml", CT_BASE)
}

fn theme_ct() -> String {
    format!("{}.theme+xml", CT_BASE)
}

const GROUP_PROPS: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#;

pub fn text_box(id: u32, name: &str, y: i64, cy: i64, text: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="838200" y="{y}"/><a:ext cx="6000000" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="pt-BR"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
    )
}

pub fn picture(id: u32, name: &str, y: i64, cy: i64, rel_id: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="10000000" y="{y}"/><a:ext cx="1000000" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
    )
}

fn slide_number_placeholder(id: u32, y: i64) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Slide Number"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldNum" sz="quarter" idx="12"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="8610600" y="{y}"/><a:ext cx="2743200" cy="365125"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:fld id="{{B6F15528-21DE-4FAA-801E-634DDDAF4B2B}}" type="slidenum"><a:rPr lang="pt-BR"/><a:t>‹nº›</a:t></a:fld></a:p></p:txBody></p:sp>"#
    )
}

fn slide_xml(shapes: &str) -> String {
    format!(
        r#"<p:sld {NS}><p:cSld><p:spTree>{GROUP_PROPS}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn layout_xml(layout_type: &str, name: &str) -> String {
    format!(
        r#"<p:sldLayout {NS} type="{layout_type}" preserve="1"><p:cSld name="{name}"><p:spTree>{GROUP_PROPS}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn master_xml(shapes: &str, layouts: usize) -> String {
    let mut ids = String::new();
    for i in 0..layouts {
        ids.push_str(&format!(
            r#"<p:sldLayoutId id="{}" r:id="rId{}"/>"#,
            2_147_483_649u32 + i as u32,
            i + 1
        ));
    }
    format!(
        r#"<p:sldMaster {NS}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{GROUP_PROPS}{shapes}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst>{ids}</p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#
    )
}

fn theme_xml(name: &str) -> String {
    format!(r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{name}"><a:themeElements/></a:theme>"#)
}

fn presentation_xml(slides: usize) -> String {
    let mut ids = String::new();
    for i in 0..slides {
        ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 3));
    }
    format!(
        r#"<p:presentation {NS} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

/// Package skeleton shared by template and user decks: presentation, one master with
/// the given layouts, a theme and `slides` slides (bodies supplied by the caller).
fn deck(
    master_shapes: &str,
    master_extra_rels: &[(&str, &str, &str)],
    layouts: &[(&str, &str)],
    slides: &[(String, Vec<(&str, &str, &str)>)],
) -> PackageBuilder {
    let mut builder = PackageBuilder::default()
        .rels("", &[("rId1", "officeDocument", "ppt/presentation.xml")])
        .xml("ppt/presentation.xml", &presentation_ct(), &presentation_xml(slides.len()));

    let mut presentation_rels: Vec<(String, &str, String)> = vec![
        ("rId1".into(), "slideMaster", "slideMasters/slideMaster1.xml".into()),
        ("rId2".into(), "theme", "theme/theme1.xml".into()),
    ];
    for i in 0..slides.len() {
        presentation_rels.push((format!("rId{}", i + 3), "slide", format!("slides/slide{}.xml", i + 1)));
    }
    let presentation_rels: Vec<(&str, &str, &str)> = presentation_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    builder = builder.rels("ppt/presentation.xml", &presentation_rels);

    let mut master_rels: Vec<(String, &str, String)> = Vec::new();
    for (i, (layout_type, name)) in layouts.iter().enumerate() {
        let part = format!("ppt/slideLayouts/slideLayout{}.xml", i + 1);
        builder = builder
            .xml(&part, &ct("slideLayout"), &layout_xml(layout_type, name))
            .rels(&part, &[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]);
        master_rels.push((
            format!("rId{}", i + 1),
            "slideLayout",
            format!("../slideLayouts/slideLayout{}.xml", i + 1),
        ));
    }
    master_rels.push((format!("rId{}", layouts.len() + 1), "theme", "../theme/theme1.xml".into()));
    let mut master_rels: Vec<(&str, &str, &str)> = master_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    master_rels.extend_from_slice(master_extra_rels);

    builder = builder
        .xml("ppt/slideMasters/slideMaster1.xml", &ct("slideMaster"), &master_xml(master_shapes, layouts.len()))
        .rels("ppt/slideMasters/slideMaster1.xml", &master_rels)
        .xml("ppt/theme/theme1.xml", &theme_ct(), &theme_xml("Deck Theme"));

    for (i, (body, rels)) in slides.iter().enumerate() {
        let part = format!("ppt/slides/slide{}.xml", i + 1);
        builder = builder.xml(&part, &ct("slide"), &slide_xml(body)).rels(&part, rels);
    }
    builder
}

/// Template with `[cover, copyright, content sample, closing]`.
///
/// The master carries a footer band: a logo picture at 17.5 cm, a slide-number
/// placeholder, and a title placeholder near the top that must not be overlaid.
pub fn template_bytes() -> Vec<u8> {
    template_with_slides(4)
}

/// Same as [`template_bytes`] but with only the first `count` template slides.
pub fn template_with_slides(count: usize) -> Vec<u8> {
    let master_shapes = format!(
        "{}{}{}",
        text_box(2, "Title Placeholder", 365_125, 1_325_563, "Clique para editar o título"),
        picture(5, "Logo", 6_300_000, 400_000, "rId4"),
        slide_number_placeholder(6, 6_356_350),
    );

    let cover = format!(
        "{}{}{}{}",
        text_box(2, "Curso", 2_000_000, 800_000, "MBA EM NOMEMBA"),
        text_box(3, "Aula", 3_000_000, 600_000, "Título da aula/disciplina"),
        text_box(4, "Professor", 3_800_000, 400_000, "Nome do(a) Professor(a)"),
        picture(5, "Logo capa", 500_000, 900_000, "rId2"),
    );
    let copyright = format!(
        "{}{}",
        text_box(2, "Aviso", 4_000_000, 1_500_000, "Todos os direitos reservados. Lei nº 9610/98"),
        text_box(3, "Pagina", 6_400_000, 300_000, "&lt;número&gt;"),
    );
    let content = text_box(2, "Conteudo", 1_500_000, 3_000_000, "Exemplo de conteúdo");
    let closing = format!(
        "{}{}{}",
        text_box(2, "Agradecimento", 1_000_000, 1_200_000, "Obrigado"),
        text_box(3, "Professor", 3_000_000, 400_000, "Nome do(a) Professor(a)"),
        text_box(4, "Perfil", 3_600_000, 400_000, "linkedin.perfil.com"),
    );

    let layout_rel = |n: usize| ("rId1", "slideLayout", if n == 1 { "../slideLayouts/slideLayout1.xml" } else { "../slideLayouts/slideLayout2.xml" });
    let slides = vec![
        (cover, vec![layout_rel(1), ("rId2", "image", "../media/image1.png"), ("rId3", "notesSlide", "../notesSlides/notesSlide1.xml")]),
        (copyright, vec![layout_rel(2)]),
        (content, vec![layout_rel(2)]),
        (closing, vec![layout_rel(1)]),
    ];
    let slides: Vec<(String, Vec<(&str, &str, &str)>)> = slides.into_iter().take(count).collect();

    deck(
        &master_shapes,
        &[("rId4", "image", "../media/image2.png")],
        &[("title", "Slide de título"), ("obj", "Título e conteúdo")],
        &slides,
    )
    .binary("ppt/media/image1.png", COVER_LOGO)
    .binary("ppt/media/image2.png", MASTER_LOGO)
    .build()
}

/// User deck with `interior` content slides on its own master (layouts `title` and
/// `blank`). Slide `overlapping` (0-based), when given, has a text box whose bottom edge
/// reaches 18 cm.
pub fn user_deck_bytes(interior: usize, overlapping: Option<usize>) -> Vec<u8> {
    user_deck_with_layouts(interior, overlapping, &[("title", "Title Slide"), ("blank", "Blank")])
}

/// User deck whose master owns `layouts`; interior slides use the second one.
pub fn user_deck_with_layouts(
    interior: usize,
    overlapping: Option<usize>,
    layouts: &[(&str, &str)],
) -> Vec<u8> {
    let slides: Vec<(String, Vec<(&str, &str, &str)>)> = (0..interior)
        .map(|i| {
            let y_end = if Some(i) == overlapping { 6_480_000 } else { 5_000_000 };
            let body = text_box(2, "Texto", 1_000_000, y_end - 1_000_000, &format!("Conteúdo {}", i + 1));
            (body, vec![("rId1", "slideLayout", "../slideLayouts/slideLayout2.xml")])
        })
        .collect();

    deck("", &[], layouts, &slides).build()
}

pub fn request() -> MergeRequest {
    MergeRequest {
        course_name: "Data Science".into(),
        theme_color: "#8245a4".into(),
        lesson_title: "Intro to ML".into(),
        professor_name: "Jane Doe".into(),
        linkedin_handle: "linkedin.com/in/janedoe".into(),
    }
}

pub fn open_deck(bytes: Vec<u8>) -> Deck {
    Deck::open(Package::from_bytes(bytes).unwrap()).unwrap()
}

/// Concatenated text of a slide.
pub fn slide_text(deck: &Deck, slide: &SlideRef) -> String {
    deck.load_slide(slide).unwrap().root.text()
}
