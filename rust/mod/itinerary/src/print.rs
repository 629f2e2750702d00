//! Print Renderers: the itinerary sheet and 80mm POS job receipts.
//!
//! Both render pure HTML documents from already-resolved data; fetching is
//! the caller's job.

use std::fmt::Write;

use serde::Deserialize;

use crate::model::{ResolvedOrder, SalesOrderSummary};
use crate::table::{Row, COLUMNS};

pub const ITINERARY_TITLE: &str = "LOGISTIC ITINERARY";
const DATE_LINE: &str = "Date: _________________________";
const DRIVER_LINE: &str = "Driver's Name: _________________";

const NO_CUSTOMER: &str = "N/A";
const NO_JOB_ORDER: &str = "No JO";
const NO_DESCRIPTION: &str = "No Description";
const NO_SHIP_ADDRESS: &str = "No Ship Address";

/// Escape text for an HTML text node or quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Company identity printed on each receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub company_name: String,
    pub logo_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            logo_url: "logo.jpg".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Itinerary
// ---------------------------------------------------------------------------

/// The itinerary as a printable document: heading, blank date and driver
/// lines, and every row's data cells. Row controls are not part of it.
pub fn render_itinerary(rows: &[Row]) -> String {
    let mut html = String::new();
    html.push_str(
        r#"<html>
  <head>
    <title>Logistic Itinerary</title>
    <style>
      body { font-family: Arial, sans-serif; padding: 20px; font-size: 12px; }
      h1 { font-size: 18px; margin-bottom: 20px; }
      .info { margin-bottom: 15px; font-size: 14px; }
      table, th, td { border: 1px solid black; border-collapse: collapse; padding: 6px; text-align: left; vertical-align: top; }
    </style>
  </head>
  <body>
"#,
    );
    let _ = writeln!(html, "    <h1>{}</h1>", ITINERARY_TITLE);
    let _ = writeln!(
        html,
        "    <div class=\"info\"><span>{}</span>&nbsp;&nbsp;&nbsp;&nbsp;<span>{}</span></div>",
        DATE_LINE,
        escape_html(DRIVER_LINE)
    );

    html.push_str("    <table>\n      <thead><tr>");
    for col in COLUMNS {
        let _ = write!(html, "<th>{}</th>", escape_html(col));
    }
    html.push_str("</tr></thead>\n      <tbody>\n");

    for row in rows {
        html.push_str("        <tr>");
        for value in row.cells.values() {
            let _ = write!(html, "<td>{}</td>", escape_html(value));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("      </tbody>\n    </table>\n  </body>\n</html>\n");
    html
}

// ---------------------------------------------------------------------------
// POS receipts
// ---------------------------------------------------------------------------

/// One sales order with its resolved transaction, ready for receipts.
#[derive(Debug, Clone)]
pub struct ReceiptOrder {
    pub order: SalesOrderSummary,
    pub resolved: ResolvedOrder,
}

/// One receipt block per job, each followed by a page break. Orders with
/// no jobs produce no receipts.
pub fn render_pos_receipts(orders: &[ReceiptOrder], transaction_number: &str, branding: &Branding) -> String {
    let mut html = String::new();
    html.push_str(
        r#"<html>
  <head>
    <style>
      @media print {
        @page { size: 80mm auto; margin: 0; }
        body { margin: 0; padding: 0; font-family: monospace; font-size: 10px; }
        .pos-receipt { width: 72mm; padding: 4mm; white-space: pre-wrap; }
      }
      .jo-block { margin-bottom: 30px; white-space: pre-wrap; page-break-after: always; }
    </style>
  </head>
  <body>
    <div class="pos-receipt">
"#,
    );

    for entry in orders {
        let header = &entry.resolved.header;
        let customer = non_empty_or(&header.customer_name, NO_CUSTOMER);
        let ship_to = non_empty_or(&header.address, NO_SHIP_ADDRESS);

        for job in &entry.resolved.jobs {
            let jo = job.job_order_no.as_deref().map_or(NO_JOB_ORDER, |n| non_empty_or(n, NO_JOB_ORDER));
            let description = non_empty_or(&job.description, NO_DESCRIPTION);

            html.push_str("      <div class=\"jo-block\">\n");
            let _ = writeln!(
                html,
                "        <div style=\"text-align: center;\"><img src=\"{}\" alt=\"Logo\" style=\"max-width: 100px;\" /><div style=\"font-weight: bold;\">{}</div></div>",
                escape_html(&branding.logo_url),
                escape_html(&branding.company_name)
            );
            let fields = [
                ("Transaction #", transaction_number),
                ("Customer", customer),
                ("JO#", jo),
                ("Description", description),
                ("Ship to", ship_to),
            ];
            for (label, value) in fields {
                let _ = writeln!(
                    html,
                    "        <div><strong>{}:</strong> {}</div>",
                    label,
                    escape_html(value)
                );
            }
            html.push_str("        <hr style=\"border-top: dashed 1px #000;\">\n      </div>\n");
        }
    }

    html.push_str("    </div>\n  </body>\n</html>\n");
    html
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}
