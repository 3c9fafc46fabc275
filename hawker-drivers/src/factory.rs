//! Production driver factory wiring the concrete drivers together.

use std::sync::Arc;

use hawker_common::{HawkerError, Result};

use crate::direct::DirectDriver;
use crate::images::ImagePipeline;
use crate::remote::RemoteDriver;
use crate::selectors::SelectorBook;
use crate::{DriverFactory, DriverSettings, ListingDriver, RemoteSettings};

pub struct WebDriverFactory {
    /// `None` disables the remote path entirely (the hybrid then falls
    /// straight through to direct on initialize).
    remote: Option<RemoteSettings>,
    settings: DriverSettings,
    book: SelectorBook,
    images: Arc<dyn ImagePipeline>,
}

impl WebDriverFactory {
    pub fn new(
        remote: Option<RemoteSettings>,
        settings: DriverSettings,
        book: SelectorBook,
        images: Arc<dyn ImagePipeline>,
    ) -> Self {
        Self {
            remote,
            settings,
            book,
            images,
        }
    }
}

#[async_trait::async_trait]
impl DriverFactory for WebDriverFactory {
    async fn connect_remote(&self) -> Result<Box<dyn ListingDriver>> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| HawkerError::Initialization("remote driver disabled".into()))?;
        let driver =
            RemoteDriver::connect(remote, self.settings.clone(), self.book.clone()).await?;
        Ok(Box::new(driver))
    }

    async fn connect_direct(&self) -> Result<Box<dyn ListingDriver>> {
        let driver = DirectDriver::connect(self.settings.clone(), self.images.clone()).await?;
        Ok(Box::new(driver))
    }
}
