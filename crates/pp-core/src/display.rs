//! Plain-text rendering of product results.

use std::fmt::Write as FmtWrite;

use pp_protocol::Product;

use crate::style::{truncate_to_width, Style};

const INDENT: &str = "     ";
const MISSING_PRICE: &str = "Price unavailable";

/// Group digits in threes: `1234567` → `1,234,567`.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `★ 4.5 (1,234 reviews)`, or `None` when there is no rating.
pub fn format_rating(product: &Product) -> Option<String> {
    let rating = product.average_rating?;
    let mut line = format!("★ {rating:.1}");
    if let Some(total) = product.total_reviews {
        let noun = if total == 1 { "review" } else { "reviews" };
        let _ = write!(line, " ({} {noun})", format_thousands(total));
    }
    Some(line)
}

/// Render one product as an indented card, `index` starting at 1.
pub fn format_product_card(index: usize, product: &Product, style: &Style, width: usize) -> String {
    let text_width = width.saturating_sub(INDENT.len()).max(10);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:>3}. {}{}{}",
        index,
        style.bold_start(),
        truncate_to_width(&product.name, text_width),
        style.reset()
    );

    if let Some(brand) = product.brand.as_deref().filter(|b| !b.is_empty()) {
        let _ = writeln!(out, "{INDENT}{}", truncate_to_width(brand, text_width));
    }

    if let Some(rating) = format_rating(product) {
        let _ = writeln!(out, "{INDENT}{}{rating}{}", style.yellow_start(), style.reset());
    }

    let price = product.price.as_deref().unwrap_or(MISSING_PRICE);
    let _ = write!(out, "{INDENT}{price}");
    if let Some(availability) = product.availability.as_deref() {
        let color = if product.is_in_stock() {
            style.green_start()
        } else {
            style.red_start()
        };
        let _ = write!(out, " · {color}{availability}{}", style.reset());
    }
    out.push('\n');

    if let Some(summary) = product.customers_summary.as_deref() {
        let _ = writeln!(out, "{INDENT}{}", truncate_to_width(summary, text_width));
    }
    if !product.url.is_empty() {
        let _ = writeln!(out, "{INDENT}{}{}{}", style.dim_start(), product.url, style.reset());
    }
    if let Some(image) = product.primary_image() {
        let _ = writeln!(out, "{INDENT}{}image: {image}{}", style.dim_start(), style.reset());
    }

    out
}

/// Render every product of a turn, separated by blank lines. Empty input
/// renders nothing.
pub fn format_product_list(products: &[Product], style: &Style, width: usize) -> String {
    if products.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let noun = if products.len() == 1 { "product" } else { "products" };
    let _ = writeln!(
        out,
        "{}{} {noun} found{}",
        style.cyan_start(),
        products.len(),
        style.reset()
    );
    for (i, product) in products.iter().enumerate() {
        out.push('\n');
        out.push_str(&format_product_card(i + 1, product, style, width));
    }
    out
}
