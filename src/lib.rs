extern crate pdf;
use log::{debug, info, warn};

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use pdf::content::*;
use pdf::encoding::{BaseEncoding, Encoding};
use pdf::error::PdfError;
use pdf::file::FileOptions;
use pdf::font::*;
use pdf::object::*;
use pdf::primitive::Name;
use pdf_encoding::{self, ForwardMap};

pub mod cli;
mod error;

pub use error::{Error, Result};

/// Appended after the text of every page.
pub const PAGE_BREAK: char = '\x0c';

/// `TJ` adjustments below this (in thousandths of an em) read as a word gap.
const WORD_GAP: f32 = -200.0;

/// Form XObjects nested deeper than this are not entered.
const MAX_FORM_DEPTH: usize = 16;

enum Decoder {
    Simple {
        base: &'static ForwardMap,
        differences: HashMap<u8, String>,
    },
    Cmap(ToUnicodeMap),
}

struct FontInfo {
    decoder: Decoder,
    /// composite fonts use two-byte codes
    wide: bool,
}

/// Encoding of a simple font that names none, picked from its base font.
fn builtin_encoding(font: &Font) -> &'static ForwardMap {
    match font.name.as_deref() {
        Some(name) if name.ends_with("Symbol") || name.ends_with("ZapfDingbats") => {
            &pdf_encoding::SYMBOL
        }
        _ => &pdf_encoding::STANDARD,
    }
}

fn differences(encoding: &Encoding) -> HashMap<u8, String> {
    encoding
        .differences
        .iter()
        .filter_map(|(&code, glyph)| {
            let code = u8::try_from(code).ok()?;
            let unicode = pdf_encoding::glyphname_to_unicode(glyph)?;
            Some((code, unicode.to_string()))
        })
        .collect()
}

fn simple_decoder(font: &Font) -> Option<Decoder> {
    let encoding = match font.encoding() {
        Some(encoding) => encoding,
        None => {
            return Some(Decoder::Simple {
                base: builtin_encoding(font),
                differences: HashMap::new(),
            })
        }
    };
    let base = match encoding.base {
        BaseEncoding::StandardEncoding => &pdf_encoding::STANDARD,
        BaseEncoding::SymbolEncoding => &pdf_encoding::SYMBOL,
        BaseEncoding::WinAnsiEncoding => &pdf_encoding::WINANSI,
        BaseEncoding::MacRomanEncoding => &pdf_encoding::MACROMAN,
        ref e if encoding.differences.is_empty() => {
            warn!("unsupported pdf encoding {:?}", e);
            return None;
        }
        // a /Differences dict without /BaseEncoding
        _ => builtin_encoding(font),
    };
    Some(Decoder::Simple {
        base,
        differences: differences(encoding),
    })
}

fn font_info(name: &Name, font: &Font, resolve: &impl Resolve) -> Option<FontInfo> {
    let wide = matches!(font.subtype, FontType::Type0);
    let decoder = match font.to_unicode(resolve) {
        Some(Ok(cmap)) => Decoder::Cmap(cmap),
        Some(Err(e)) => {
            warn!("font {:?}: unreadable ToUnicode map: {:?}", name, e);
            return None;
        }
        None if wide => {
            debug!("composite font {:?} has no ToUnicode map, its text is skipped", name);
            return None;
        }
        None => simple_decoder(font)?,
    };
    Some(FontInfo { decoder, wide })
}

/// Where the current font was selected: `Tf` or an ExtGState carrying `/Font`.
#[derive(Clone)]
enum FontSlot {
    Font(Name),
    GraphicsState(Name),
}

#[derive(Default)]
struct Cache {
    fonts: HashMap<Name, FontInfo>,
    gs_fonts: HashMap<Name, FontInfo>,
}
impl Cache {
    fn new(resources: &Resources, resolve: &impl Resolve) -> Self {
        let mut cache = Cache::default();
        for (name, font) in &resources.fonts {
            match font.load(resolve) {
                Ok(font) => {
                    if let Some(info) = font_info(name, &font, resolve) {
                        cache.fonts.insert(name.clone(), info);
                    }
                }
                Err(e) => warn!("font {:?} failed to load: {:?}", name, e),
            }
        }
        for (name, gs) in &resources.graphics_states {
            if let Some((font, _)) = gs.font {
                match resolve.get(font) {
                    Ok(font) => {
                        if let Some(info) = font_info(name, &font, resolve) {
                            cache.gs_fonts.insert(name.clone(), info);
                        }
                    }
                    Err(e) => warn!("graphics state {:?}: font failed to load: {:?}", name, e),
                }
            }
        }
        cache
    }
    fn get_font(&self, slot: &FontSlot) -> Option<&FontInfo> {
        match *slot {
            FontSlot::Font(ref name) => self.fonts.get(name),
            FontSlot::GraphicsState(ref name) => self.gs_fonts.get(name),
        }
    }
}

fn codes(data: &[u8], wide: bool) -> impl Iterator<Item = u16> + '_ {
    let width = if wide { 2 } else { 1 };
    data.chunks_exact(width)
        .map(|c| c.iter().fold(0, |code, &b| code << 8 | b as u16))
}

fn add_string(data: &[u8], out: &mut String, info: &FontInfo) {
    match info.decoder {
        Decoder::Cmap(ref cmap) => {
            for code in codes(data, info.wide) {
                if let Some(s) = cmap.get(code) {
                    out.push_str(s);
                }
            }
        }
        Decoder::Simple {
            base,
            ref differences,
        } => {
            for &b in data {
                if let Some(s) = differences.get(&b) {
                    out.push_str(s);
                } else if let Some(c) = base.get(b) {
                    out.push(c);
                }
            }
        }
    }
}

fn push_gap(out: &mut String) {
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn add_array(arr: &[TextDrawAdjusted], out: &mut String, info: &FontInfo) {
    for p in arr.iter() {
        match *p {
            TextDrawAdjusted::Text(ref s) => add_string(s.as_bytes(), out, info),
            TextDrawAdjusted::Spacing(offset) if offset < WORD_GAP => push_gap(out),
            _ => {}
        }
    }
}

struct TextSink<'a, R> {
    resolve: &'a R,
    out: String,
    font: Option<FontSlot>,
    leading: f32,
    matrix: Matrix,
}

impl<'a, R: Resolve> TextSink<'a, R> {
    fn new(resolve: &'a R) -> Self {
        TextSink {
            resolve,
            out: String::new(),
            font: None,
            leading: 1.0,
            matrix: Matrix {
                a: 1.0,
                b: 0.0,
                c: 0.0,
                d: 1.0,
                e: 0.0,
                f: 0.0,
            },
        }
    }

    fn walk(
        &mut self,
        ops: &[Op],
        resources: Option<&Resources>,
        depth: usize,
    ) -> std::result::Result<(), PdfError> {
        // make sure all fonts are in the cache, so we can reference them
        let cache = resources
            .map(|r| Cache::new(r, self.resolve))
            .unwrap_or_default();

        for op in ops {
            match *op {
                Op::GraphicsState { ref name } => {
                    if cache.gs_fonts.contains_key(name) {
                        self.font = Some(FontSlot::GraphicsState(name.clone()));
                    }
                }
                Op::Leading { leading } => self.leading = leading,
                Op::TextFont { ref name, .. } => {
                    self.font = Some(FontSlot::Font(name.clone()));
                }
                Op::TextDraw { ref text } => {
                    if let Some(font) = self.font.as_ref().and_then(|s| cache.get_font(s)) {
                        add_string(text.as_bytes(), &mut self.out, font);
                    }
                }
                Op::TextDrawAdjusted { ref array } => {
                    if let Some(font) = self.font.as_ref().and_then(|s| cache.get_font(s)) {
                        add_array(array, &mut self.out, font);
                    }
                }
                Op::TextNewline => {
                    self.out.push('\n');
                    self.matrix.f -= self.leading * self.matrix.d;
                }
                Op::MoveTextPosition { translation } => {
                    self.matrix.f += translation.y * self.matrix.d;

                    if translation.y != 0.0 {
                        self.out.push('\n');
                    } else if translation.x > 0.0 {
                        push_gap(&mut self.out);
                    }
                }
                Op::SetTextMatrix { matrix } => {
                    if matrix.f != self.matrix.f {
                        self.out.push('\n');
                    } else {
                        self.out.push('\t');
                    }
                    self.matrix = matrix;
                }
                Op::XObject { ref name } => self.form(name, resources, depth)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn form(
        &mut self,
        name: &Name,
        resources: Option<&Resources>,
        depth: usize,
    ) -> std::result::Result<(), PdfError> {
        let xobject = match resources.and_then(|r| r.xobjects.get(name)) {
            Some(&xobject) => match self.resolve.get(xobject) {
                Ok(xobject) => xobject,
                Err(e) => {
                    warn!("xobject {:?} failed to load: {:?}", name, e);
                    return Ok(());
                }
            },
            None => {
                warn!("missing xobject {:?}", name);
                return Ok(());
            }
        };
        let form = match *xobject {
            XObject::Form(ref form) => form,
            _ => return Ok(()),
        };
        if depth >= MAX_FORM_DEPTH {
            warn!("form {:?} nested too deep, skipped", name);
            return Ok(());
        }

        let ops = form.operations(self.resolve)?;
        let inner = form.dict().resources.as_deref().or(resources);
        // `Do` runs inside its own graphics state
        let font = self.font.clone();
        self.walk(&ops, inner, depth + 1)?;
        self.font = font;
        Ok(())
    }
}

/// Extract the text drawn on a single page, including text inside form XObjects.
///
/// Fonts without a usable ToUnicode map or encoding contribute nothing.
pub fn page_text(page: &Page, resolve: &impl Resolve) -> std::result::Result<String, PdfError> {
    let resources: Option<&Resources> = match page.resources() {
        Ok(resources) => Some(resources),
        Err(e) => {
            warn!("page resources failed to load: {:?}", e);
            None
        }
    };
    let contents = match page.contents {
        Some(ref contents) => contents,
        None => return Ok(String::new()),
    };

    let mut sink = TextSink::new(resolve);
    sink.walk(&contents.operations(resolve)?, resources, 0)?;
    Ok(sink.out)
}

/// Extract the text of every page of the PDF at `path`.
///
/// Pages appear in document order, each followed by [`PAGE_BREAK`].
pub fn extract_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|source| Error::Read {
        path: path.to_owned(),
        source,
    })?;
    let file = FileOptions::cached().load(data)?;
    let resolver = file.resolver();

    let mut out = String::new();
    let mut pages = 0;
    for (page_nr, page) in file.pages().enumerate() {
        let page = page?;
        let text = page_text(&page, &resolver)?;
        debug!("page {}: {} chars", page_nr, text.chars().count());
        out.push_str(&text);
        out.push(PAGE_BREAK);
        pages += 1;
    }
    info!("read {} pages from {}", pages, path.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(base: &'static ForwardMap, differences: &[(u8, &str)]) -> FontInfo {
        FontInfo {
            decoder: Decoder::Simple {
                base,
                differences: differences
                    .iter()
                    .map(|&(code, s)| (code, s.to_string()))
                    .collect(),
            },
            wide: false,
        }
    }

    #[test]
    fn narrow_codes_are_single_bytes() {
        let codes: Vec<u16> = codes(b"AB", false).collect();
        assert_eq!(codes, [0x41, 0x42]);
    }

    #[test]
    fn wide_codes_pair_bytes_big_endian() {
        let codes: Vec<u16> = codes(&[0x00, 0x41, 0x01, 0x02], true).collect();
        assert_eq!(codes, [0x0041, 0x0102]);
    }

    #[test]
    fn wide_codes_drop_trailing_odd_byte() {
        assert_eq!(codes(&[0x00, 0x41, 0x07], true).count(), 1);
    }

    #[test]
    fn winansi_decoding() {
        let mut out = String::new();
        add_string(b"Hello World", &mut out, &simple(&pdf_encoding::WINANSI, &[]));
        assert_eq!(out, "Hello World");
    }

    #[test]
    fn differences_override_the_base_encoding() {
        let info = simple(&pdf_encoding::STANDARD, &[(b'A', "H"), (0x01, "fi")]);
        let mut out = String::new();
        add_string(b"Aello \x01ne", &mut out, &info);
        assert_eq!(out, "Hello fine");
    }

    #[test]
    fn gap_is_not_doubled_or_leading() {
        let mut out = String::new();
        push_gap(&mut out);
        assert_eq!(out, "");
        out.push_str("Hello");
        push_gap(&mut out);
        push_gap(&mut out);
        assert_eq!(out, "Hello ");
        out.push('\n');
        push_gap(&mut out);
        assert_eq!(out, "Hello \n");
    }
}
