//! Printable proxy sheets.
//!
//! Renders one card-sized frame per copy, nine to a US Letter page, with the card name, set
//! code and board. The PDF uses the standard Helvetica font, so text is reduced to printable
//! ASCII before it is written.

use crate::config::ProxyConfig;
use crate::db::models::cards::{CollectionCard, DeckCard};
use crate::errors::Error;
use crate::types::Board;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error as ThisError;
use tracing::debug;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const CARD_WIDTH: i64 = 180;
const CARD_HEIGHT: i64 = 252;
const COLUMNS: i64 = 3;
const ROWS: i64 = 3;
const PER_PAGE: usize = (COLUMNS * ROWS) as usize;
const MARGIN_X: i64 = (PAGE_WIDTH - COLUMNS * CARD_WIDTH) / 2;
const MARGIN_Y: i64 = (PAGE_HEIGHT - ROWS * CARD_HEIGHT) / 2;

const NAME_CHARS: usize = 26;
const DETAIL_CHARS: usize = 34;

/// One line of a proxy request: a card and how many copies to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCard {
    pub name: String,
    pub set_code: String,
    pub board: Option<Board>,
    pub quantity: u32,
}

impl From<&CollectionCard> for ProxyCard {
    fn from(card: &CollectionCard) -> Self {
        Self {
            name: card.name.clone(),
            set_code: card.set_code.clone(),
            board: None,
            quantity: card.quantity,
        }
    }
}

impl From<&DeckCard> for ProxyCard {
    fn from(card: &DeckCard) -> Self {
        Self {
            name: card.name.clone(),
            set_code: card.set_code.clone(),
            board: Some(card.board),
            quantity: card.quantity,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("No cards to print")]
    Empty,

    #[error("Too many cards to print: {requested} requested, the limit is {limit}")]
    TooMany { requested: u64, limit: usize },

    #[error("PDF rendering failed: {0}")]
    Render(String),
}

impl From<ProxyError> for Error {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Render(_) => Error::Other(anyhow::anyhow!(err)),
            _ => Error::BadRequest { message: err.to_string() },
        }
    }
}

fn render_err(e: impl std::fmt::Display) -> ProxyError {
    ProxyError::Render(e.to_string())
}

/// Reduce text to printable ASCII and cap its length, marking truncation with "..."
fn pdf_text(raw: &str, max_chars: usize) -> String {
    let ascii: String = raw
        .trim()
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect();

    if ascii.chars().count() <= max_chars {
        ascii
    } else {
        let kept: String = ascii.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept.trim_end())
    }
}

fn text(font_size: i64, x: i64, y: i64, body: String) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), font_size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(body)]),
        Operation::new("ET", vec![]),
    ]
}

/// Drawing operations for the card in grid slot `slot` of a page
fn card_operations(card: &ProxyCard, slot: usize) -> Vec<Operation> {
    let column = slot as i64 % COLUMNS;
    let row = slot as i64 / COLUMNS;
    let x = MARGIN_X + column * CARD_WIDTH;
    // Fill from the top of the page down
    let y = PAGE_HEIGHT - MARGIN_Y - (row + 1) * CARD_HEIGHT;

    let mut ops = vec![
        Operation::new("w", vec![1.into()]),
        Operation::new("re", vec![x.into(), y.into(), CARD_WIDTH.into(), CARD_HEIGHT.into()]),
        Operation::new("S", vec![]),
        Operation::new("re", vec![(x + 8).into(), (y + 8).into(), (CARD_WIDTH - 16).into(), (CARD_HEIGHT - 16).into()]),
        Operation::new("S", vec![]),
    ];

    ops.extend(text(11, x + 16, y + CARD_HEIGHT - 32, pdf_text(&card.name, NAME_CHARS)));

    let mut detail = if card.set_code.trim().is_empty() {
        "Unknown set".to_string()
    } else {
        card.set_code.trim().to_uppercase()
    };
    if let Some(board) = card.board {
        detail = format!("{detail} / {board}");
    }
    ops.extend(text(8, x + 16, y + CARD_HEIGHT - 48, pdf_text(&detail, DETAIL_CHARS)));
    ops.extend(text(16, x + 62, y + 24, "PROXY".to_string()));

    ops
}

/// Render a proxy sheet. Each copy gets its own frame, in the order given.
pub fn render(title: &str, cards: &[ProxyCard], limits: &ProxyConfig) -> Result<Vec<u8>, ProxyError> {
    let requested: u64 = cards.iter().map(|c| u64::from(c.quantity)).sum();
    if requested == 0 {
        return Err(ProxyError::Empty);
    }
    if requested > limits.max_cards as u64 {
        return Err(ProxyError::TooMany {
            requested,
            limit: limits.max_cards,
        });
    }

    let copies: Vec<&ProxyCard> = cards
        .iter()
        .flat_map(|c| std::iter::repeat_n(c, c.quantity as usize))
        .collect();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in copies.chunks(PER_PAGE) {
        let operations: Vec<Operation> = page
            .iter()
            .enumerate()
            .flat_map(|(slot, card)| card_operations(card, slot))
            .collect();
        let content = Content { operations }.encode().map_err(render_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(pdf_text(title, 120)),
        "Producer" => Object::string_literal("grimoire"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(render_err)?;

    debug!(copies = copies.len(), pages = page_count, "Rendered proxy sheet");
    metrics::counter!("grimoire_proxy_pages_total").increment(page_count as u64);

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, quantity: u32) -> ProxyCard {
        ProxyCard {
            name: name.to_string(),
            set_code: "lea".to_string(),
            board: Some(Board::Main),
            quantity,
        }
    }

    #[test]
    fn test_pdf_text_sanitizes_and_truncates() {
        assert_eq!(pdf_text("  Lightning Bolt ", 26), "Lightning Bolt");
        assert_eq!(pdf_text("Jötun Grunt", 26), "J?tun Grunt");
        assert_eq!(pdf_text("Asmoranomardicadaistinaculdacar", 12), "Asmoranom...");
    }

    #[test]
    fn test_renders_one_page_per_nine_copies() {
        let cards = vec![card("Lightning Bolt", 4), card("Mountain", 6)];
        let bytes = render("Burn", &cards, &ProxyConfig::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let single = render("One", &[card("Sol Ring", 9)], &ProxyConfig::default()).unwrap();
        assert_eq!(Document::load_mem(&single).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_limits() {
        assert!(matches!(render("Empty", &[], &ProxyConfig::default()), Err(ProxyError::Empty)));
        assert!(matches!(
            render("Nothing", &[card("Island", 0)], &ProxyConfig::default()),
            Err(ProxyError::Empty)
        ));

        let limits = ProxyConfig { max_cards: 10 };
        let err = render("Big", &[card("Island", 11)], &limits).unwrap_err();
        assert!(matches!(err, ProxyError::TooMany { requested: 11, limit: 10 }));

        let api: Error = err.into();
        assert_eq!(api.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
