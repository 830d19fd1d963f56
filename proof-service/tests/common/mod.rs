//! Common test utilities for proof-service integration tests.
//!
//! The hosted backend is a `wiremock` server; blobs go to a temporary
//! directory through the local storage backend.

use proof_service::config::{BackendConfig, ConverterConfig, ProofServiceConfig, StorageConfig};
use proof_service::startup::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::MockServer;

pub const ANON_KEY: &str = "anon-key";
pub const USER_TOKEN: &str = "user-jwt";
pub const TEMP_BUCKET: &str = "payment-proofs-temp";
pub const PROOF_BUCKET: &str = "payment-proofs";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,proof_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(backend_url: &str, storage_path: &Path) -> ProofServiceConfig {
    ProofServiceConfig {
        common: CommonConfig { port: 0 },
        service_name: "proof-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        backend: BackendConfig {
            url: backend_url.to_string(),
            anon_key: Secret::new(ANON_KEY.to_string()),
            analyze_function: "analyze-payment".to_string(),
            timeout: Duration::from_secs(5),
        },
        storage: StorageConfig {
            temp_bucket: TEMP_BUCKET.to_string(),
            proof_bucket: PROOF_BUCKET.to_string(),
            local_path: Some(storage_path.to_path_buf()),
        },
        converter: ConverterConfig {
            timeout: Duration::from_secs(10),
            raster_dpi: 72,
        },
        max_upload_bytes: MAX_UPLOAD_BYTES,
        allowed_origins: Vec::new(),
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub backend: MockServer,
    pub storage: TempDir,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn spawn() -> Self {
        init_tracing();

        let backend = MockServer::start().await;
        let storage = tempfile::tempdir().expect("Failed to create storage dir");

        let app = Application::build(test_config(&backend.uri(), storage.path()))
            .await
            .expect("Failed to build application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address,
            backend,
            storage,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(USER_TOKEN)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(USER_TOKEN)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(USER_TOKEN)
    }

    pub fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        self.storage.path().join(bucket).join(path)
    }

    /// Store an object directly, bypassing the service.
    pub fn put_object(&self, bucket: &str, path: &str, data: &[u8]) {
        let full = self.object_path(bucket, path);
        std::fs::create_dir_all(full.parent().expect("object has a parent")).unwrap();
        std::fs::write(full, data).unwrap();
    }

    /// Object paths (relative to the bucket) under `prefix`.
    pub fn objects(&self, bucket: &str, prefix: &str) -> Vec<String> {
        let dir = self.object_path(bucket, prefix);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| format!("{}/{}", prefix, e.file_name().to_string_lossy()))
            .collect();
        names.sort();
        names
    }
}

// ============================================================================
// Backend rows
// ============================================================================

#[allow(dead_code)]
pub fn payment_row(
    id: Uuid,
    tranche_id: Uuid,
    subscription_id: Uuid,
    montant: f64,
    due: &str,
    statut: &str,
) -> Value {
    json!({
        "id": id,
        "tranche_id": tranche_id,
        "souscription_id": subscription_id,
        "montant": montant,
        "date_echeance": due,
        "date_paiement": null,
        "statut": statut
    })
}

#[allow(dead_code)]
pub fn subscription_row(id: Uuid, tranche_id: Uuid, investor: &str, coupon_net: f64) -> Value {
    json!({
        "id": id,
        "tranche_id": tranche_id,
        "investisseur_id": Uuid::new_v4(),
        "montant_investi": 50000,
        "coupon_brut": null,
        "coupon_net": coupon_net,
        "date_souscription": "2025-01-15",
        "investisseur": {
            "id": Uuid::new_v4(),
            "nom_raison_sociale": investor,
            "type": "physique",
            "siren": null,
            "email": null
        }
    })
}

#[allow(dead_code)]
pub fn proof_row(id: Uuid, payment_id: Uuid, file_url: &str) -> Value {
    json!({
        "id": id,
        "paiement_id": payment_id,
        "file_url": file_url,
        "file_name": "virement.png",
        "file_size": 24,
        "extracted_data": { "amount": "1250.00", "beneficiary": "Jean Dupont" },
        "confidence": 95,
        "validated_at": "2026-10-17T09:30:00Z"
    })
}

// ============================================================================
// Documents
// ============================================================================

/// Whether the poppler tools used for PDFs are installed on this machine.
#[allow(dead_code)]
pub fn poppler_available() -> bool {
    ["pdftoppm", "pdftotext"].iter().all(|tool| {
        std::process::Command::new(tool)
            .arg("-v")
            .output()
            .is_ok()
    })
}

/// A minimal PDF with one Helvetica text line per page.
///
/// Lines must not contain parentheses or backslashes.
#[allow(dead_code)]
pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let font_id = 3;
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (page_id, text) in page_ids.iter().zip(pages) {
        let content = format!("BT /F1 12 Tf 50 780 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
             /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
            font_id,
            page_id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}
