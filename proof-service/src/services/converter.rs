//! Turns uploaded proof documents into what the analysis and matching steps
//! consume: PNG pages for PDFs, raw text for statements.

use crate::config::ConverterConfig;
use crate::services::executor::CommandExecutor;
use service_core::error::AppError;
use std::path::Path;
use tokio::fs;

const INPUT_PDF: &str = "input.pdf";
const PAGE_PREFIX: &str = "page";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    Pdf,
    Png,
    Jpeg,
    Webp,
}

impl ProofKind {
    /// Identify a file by its leading bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.split(';').next().map(str::trim) {
            Some("application/pdf") => Some(Self::Pdf),
            Some("image/png") => Some(Self::Png),
            Some("image/jpeg") | Some("image/jpg") => Some(Self::Jpeg),
            Some("image/webp") => Some(Self::Webp),
            _ => None,
        }
    }

    /// Accepted when the bytes are a supported format and the declared type,
    /// if any, agrees with them.
    pub fn from_upload(content_type: &str, data: &[u8]) -> Option<Self> {
        let sniffed = Self::sniff(data)?;
        let declared = content_type.trim();
        if declared.is_empty() || declared.starts_with("application/octet-stream") {
            return Some(sniffed);
        }
        (Self::from_content_type(declared) == Some(sniffed)).then_some(sniffed)
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

/// A file as received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ProofImage {
    pub kind: ProofKind,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct DocumentConverter {
    executor: CommandExecutor,
    dpi: u32,
}

impl DocumentConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            executor: CommandExecutor::new(config.timeout),
            dpi: config.raster_dpi,
        }
    }

    /// Images passed to the analysis step: one PNG per PDF page, or the
    /// image itself.
    pub async fn to_images(
        &self,
        kind: ProofKind,
        file: &UploadedFile,
    ) -> Result<Vec<ProofImage>, AppError> {
        match kind {
            ProofKind::Pdf => {
                let pages = self.rasterize_pdf(&file.data).await?;
                tracing::info!(
                    file_name = %file.file_name,
                    pages = pages.len(),
                    "PDF rasterized"
                );
                Ok(pages
                    .into_iter()
                    .map(|data| ProofImage {
                        kind: ProofKind::Png,
                        data,
                    })
                    .collect())
            }
            image => Ok(vec![ProofImage {
                kind: image,
                data: file.data.clone(),
            }]),
        }
    }

    /// Render every page of `pdf` to PNG with `pdftoppm`.
    pub async fn rasterize_pdf(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, AppError> {
        let workdir = tempfile::tempdir()?;
        fs::write(workdir.path().join(INPUT_PDF), pdf).await?;

        let dpi = self.dpi.to_string();
        self.executor
            .execute(
                "pdftoppm",
                &["-png", "-r", dpi.as_str(), INPUT_PDF, PAGE_PREFIX],
                Some(workdir.path()),
            )
            .await?;

        let pages = collect_pages(workdir.path()).await?;
        if pages.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("PDF has no pages")));
        }
        Ok(pages)
    }

    /// Extract the text layer of `pdf` with `pdftotext`, keeping the layout
    /// so table rows stay on one line.
    pub async fn pdf_text(&self, pdf: &[u8]) -> Result<String, AppError> {
        let workdir = tempfile::tempdir()?;
        fs::write(workdir.path().join(INPUT_PDF), pdf).await?;

        let output = self
            .executor
            .execute("pdftotext", &["-layout", INPUT_PDF, "-"], Some(workdir.path()))
            .await?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Page files in page order; `pdftoppm` zero-pads numbers so name order is page order.
async fn collect_pages(dir: &Path) -> Result<Vec<Vec<u8>>, AppError> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_page_file(&name) {
            names.push(name);
        }
    }
    names.sort();

    let mut pages = Vec::with_capacity(names.len());
    for name in names {
        pages.push(fs::read(dir.join(name)).await?);
    }
    Ok(pages)
}

fn is_page_file(name: &str) -> bool {
    name.starts_with(PAGE_PREFIX) && name.ends_with(".png")
}
