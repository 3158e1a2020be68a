//! Receipt documents: an HTML template rendered with tera and converted to
//! PDF by wkhtmltopdf.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::FixedOffset;
use marmita_core::pricing::format_brl;
use marmita_core::receipt::{Receipt, ReceiptError, ReceiptRenderer, RenderedDocument};
use rust_decimal::Decimal;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{info, warn};

const RECEIPT_TEMPLATE: &str = "receipt.html.tera";
const PRIMARY_COLOR: &str = "#c2410c";

/// `"74.00" | brl` -> `R$ 74,00`. Decimals reach the template as strings.
fn tera_brl_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw)
            .map_err(|error| tera::Error::msg(format!("brl filter expects a decimal: {error}")))?,
        tera::Value::Number(number) => number
            .as_f64()
            .and_then(|number| Decimal::try_from(number).ok())
            .unwrap_or_default(),
        _ => Decimal::ZERO,
    };
    Ok(tera::Value::String(format_brl(amount)))
}

pub struct PdfReceiptRenderer {
    tera: Tera,
    converter: Option<PathBuf>,
    business_name: String,
    local_offset: FixedOffset,
}

impl PdfReceiptRenderer {
    /// Looks the converter up on `PATH`; a missing converter is reported at render time.
    pub fn new(
        converter: &str,
        business_name: impl Into<String>,
        local_offset: FixedOffset,
    ) -> Result<Self, ReceiptError> {
        let mut tera = Tera::default();
        tera.register_filter("brl", tera_brl_filter);
        tera.add_raw_template(
            RECEIPT_TEMPLATE,
            include_str!("../../../templates/receipts/receipt.html.tera"),
        )
        .map_err(|error| ReceiptError::Template(error.to_string()))?;

        let converter_path = which::which(converter).ok();
        match &converter_path {
            Some(path) => info!(
                event_name = "system.receipts.converter_found",
                path = %path.display(),
                "receipt converter found"
            ),
            None => warn!(
                event_name = "system.receipts.converter_missing",
                converter,
                "receipt converter not found; receipts will be sent as text"
            ),
        }

        Ok(Self { tera, converter: converter_path, business_name: business_name.into(), local_offset })
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    pub fn render_html(&self, receipt: &Receipt) -> Result<String, ReceiptError> {
        let issued_at = receipt.issued_at.with_timezone(&self.local_offset);
        let mut context = Context::new();
        context.insert("receipt", receipt);
        context.insert("business_name", &self.business_name);
        context.insert("issued_at", &issued_at.format("%d/%m/%Y %H:%M").to_string());
        context.insert("primary_color", PRIMARY_COLOR);

        self.tera
            .render(RECEIPT_TEMPLATE, &context)
            .map_err(|error| ReceiptError::Template(error.to_string()))
    }

    async fn convert(&self, html: &str, converter: &Path) -> Result<Vec<u8>, ReceiptError> {
        let temp_dir = std::env::temp_dir();
        let stem = uuid::Uuid::new_v4().simple().to_string();
        let html_path = temp_dir.join(format!("receipt_{stem}.html"));
        let pdf_path = temp_dir.join(format!("receipt_{stem}.pdf"));

        tokio::fs::write(&html_path, html).await?;

        let output = Command::new(converter)
            .args(["--page-size", "A5", "--encoding", "utf-8", "--quiet"])
            .arg(&html_path)
            .arg(&pdf_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        let _ = tokio::fs::remove_file(&html_path).await;
        let output = output?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&pdf_path).await;
            return Err(ReceiptError::Conversion(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }

        let bytes = tokio::fs::read(&pdf_path).await?;
        let _ = tokio::fs::remove_file(&pdf_path).await;
        Ok(bytes)
    }
}

#[async_trait]
impl ReceiptRenderer for PdfReceiptRenderer {
    async fn render(&self, receipt: &Receipt) -> Result<RenderedDocument, ReceiptError> {
        let converter = self.converter.as_deref().ok_or(ReceiptError::ConverterUnavailable)?;
        let html = self.render_html(receipt)?;
        let bytes = self.convert(&html, converter).await?;

        info!(
            event_name = "system.receipts.rendered",
            receipt = %receipt.number,
            size = bytes.len(),
            "receipt document rendered"
        );
        Ok(RenderedDocument {
            bytes,
            file_name: receipt.file_name(),
            content_type: "application/pdf".to_owned(),
        })
    }
}
