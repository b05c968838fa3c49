use anyhow::{anyhow, Context, Result};
use reqwest::{Certificate, Client, Identity};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DATA_USER_AGENT: &str = "Mozilla/5.0 (compatible; forecaster/0.1)";

/// PEM files for mutual TLS against the remote trainer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainerTls {
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

impl TrainerTls {
    fn root_certificate(&self) -> Result<Option<Certificate>> {
        let Some(path) = self.ca_cert.as_deref() else {
            return Ok(None);
        };
        let pem = read_pem(path, "CA certificate")?;
        let certificate = Certificate::from_pem(&pem)
            .with_context(|| format!("failed to parse trainer CA certificate {}", path.display()))?;
        Ok(Some(certificate))
    }

    fn identity(&self) -> Result<Option<Identity>> {
        let (cert_path, key_path) = match (
            self.client_cert.as_deref(),
            self.client_key.as_deref(),
        ) {
            (None, None) => return Ok(None),
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                return Err(anyhow!(
                    "TRAINER_MTLS_CLIENT_CERT and TRAINER_MTLS_CLIENT_KEY must be set together"
                ))
            }
        };

        // rustls wants certificate chain and private key in one PEM bundle
        let mut bundle = read_pem(cert_path, "client certificate")?;
        if !bundle.ends_with(b"\n") {
            bundle.push(b'\n');
        }
        bundle.extend_from_slice(&read_pem(key_path, "client key")?);

        let identity = Identity::from_pem(&bundle).with_context(|| {
            format!(
                "failed to build trainer client identity from {} and {}",
                cert_path.display(),
                key_path.display()
            )
        })?;
        Ok(Some(identity))
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read trainer {} {}", what, path.display()))
}

/// Client for the public data providers. Every request is bounded by `timeout`.
pub fn build_data_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(DATA_USER_AGENT)
        .build()
        .context("failed to build HTTP client")
}

pub fn build_trainer_client(timeout: Duration, tls: &TrainerTls) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(certificate) = tls.root_certificate()? {
        builder = builder.add_root_certificate(certificate);
    }
    if let Some(identity) = tls.identity()? {
        builder = builder.identity(identity);
    }
    builder.build().context("failed to build trainer HTTP client")
}
