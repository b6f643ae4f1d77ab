use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::feed::PageFetcher;
use crate::models::ExtractedArticle;

const TEXT_WIDTH: usize = 80;

/// Fetch an article page and pull out its readable parts.
pub async fn fetch_article<F>(fetcher: &F, article_url: &str) -> Result<ExtractedArticle>
where
    F: PageFetcher + ?Sized,
{
    let html = fetcher.fetch_text(article_url).await?;
    Ok(extract_article(&html))
}

/// Title, meta description and boilerplate-free body text of a page.
pub fn extract_article(html: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| first_text(&document, "title"));

    let meta_description = meta_content(&document, r#"meta[name="description"]"#)
        .or_else(|| meta_content(&document, r#"meta[property="og:description"]"#));

    let cleaned_body = ["article", "main", "body"]
        .iter()
        .find_map(|tag| first_element(&document, tag))
        .map(|element| clean_text(&element.html()))
        .unwrap_or_default();

    ExtractedArticle {
        title,
        meta_description,
        cleaned_body,
    }
}

fn first_element<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    first_element(document, selector)
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    first_element(document, selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Render HTML to plain text, dropping blank lines and edge whitespace.
fn clean_text(html: &str) -> String {
    let text = match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return String::new();
        }
    };

    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
