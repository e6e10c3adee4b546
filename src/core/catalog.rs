#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use reqwest::StatusCode;
use url::Url;

/// Downloads the supplement catalog a transformation refers to.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
}

impl CatalogClient {
    pub fn new() -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mgdm2oereb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("failed to build http client: {}", err),
                )
            })?;
        Ok(CatalogClient { http })
    }

    /// Body bytes of a `200` answer, untouched so the server's encoding survives.
    pub async fn fetch(&self, catalog: &Url) -> Result<Vec<u8>, AppError> {
        let response = self.http.get(catalog.clone()).send().await.map_err(|err| {
            AppError::new(
                ErrorCategory::CatalogError,
                format!("Catalogue could not be downloaded. Response was: {}", err),
            )
            .with_code("CAT-002")
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let mut err = AppError::new(
                ErrorCategory::CatalogError,
                format!("Catalogue could not be downloaded. Response was: {}", body),
            )
            .with_code("CAT-001");
            err.add_context("status", &status.as_u16().to_string());
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|err| {
            AppError::new(
                ErrorCategory::CatalogError,
                format!("Catalogue could not be downloaded. Response was: {}", err),
            )
            .with_code("CAT-002")
        })?;
        tracing::debug!(url = %catalog, bytes = bytes.len(), "catalog downloaded");
        Ok(bytes.to_vec())
    }
}
