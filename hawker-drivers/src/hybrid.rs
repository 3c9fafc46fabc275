//! Hybrid orchestrator: prefer the remote driver, downgrade to direct.
//!
//! The downgrade is one-directional per session ([`DriverMode::on_failure`]
//! never upgrades): once any operation fails in Remote mode the remote
//! session is torn down best-effort, a Direct session is brought up and
//! re-authenticated, and the failed operation is retried exactly once. A
//! second failure propagates. The orchestrator never builds two live
//! sessions at once.

use std::path::PathBuf;
use std::sync::Arc;

use hawker_common::{
    Credentials, DriverMode, HawkerError, ListingData, ListingResult, Result,
};
use tracing::{info, warn};

use crate::{DriverFactory, ListingDriver};

pub struct HybridDriver {
    factory: Arc<dyn DriverFactory>,
    active: Option<Box<dyn ListingDriver>>,
    mode: DriverMode,
    credentials: Option<Credentials>,
}

impl HybridDriver {
    pub fn new(factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            factory,
            active: None,
            mode: DriverMode::Remote,
            credentials: None,
        }
    }

    pub fn mode(&self) -> DriverMode {
        self.mode
    }

    /// Bring up a driver: Remote first, one fallback to Direct. Both
    /// failing is fatal at this layer.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.factory.connect_remote().await {
            Ok(driver) => {
                info!(target: "hybrid", "remote driver initialized");
                self.mode = DriverMode::Remote;
                self.active = Some(driver);
                Ok(())
            }
            Err(remote_err) => {
                warn!(target: "hybrid", error = %remote_err, "remote init failed, trying direct");
                match self.factory.connect_direct().await {
                    Ok(driver) => {
                        self.mode = DriverMode::Direct;
                        self.active = Some(driver);
                        info!(target: "hybrid", "direct driver initialized");
                        Ok(())
                    }
                    Err(direct_err) => Err(HawkerError::Initialization(format!(
                        "remote: {remote_err}; direct: {direct_err}"
                    ))),
                }
            }
        }
    }

    pub async fn login(&mut self, creds: &Credentials) -> Result<()> {
        self.credentials = Some(creds.clone());

        let first = self.driver()?.login(creds).await;
        match first {
            Ok(()) => Ok(()),
            Err(err) if self.mode == DriverMode::Remote => {
                warn!(target: "hybrid", error = %err, "remote login failed, downgrading");
                self.downgrade().await?;
                self.driver()?.login(creds).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn navigate_to_marketplace(&mut self) -> Result<()> {
        let first = self.driver()?.navigate_to_marketplace().await;
        match first {
            Ok(()) => Ok(()),
            Err(err) if self.mode == DriverMode::Remote => {
                warn!(target: "hybrid", error = %err, "remote navigation failed, downgrading");
                self.downgrade_and_relogin().await?;
                self.driver()?.navigate_to_marketplace().await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn create_listing(&mut self, data: &ListingData) -> Result<ListingResult> {
        let first = self.driver()?.create_listing(data).await;
        match first {
            Ok(result) => Ok(result),
            Err(err) if self.mode == DriverMode::Remote => {
                warn!(target: "hybrid", error = %err, "remote listing creation failed, downgrading");
                self.downgrade_and_relogin().await?;
                self.driver()?.create_listing(data).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn screenshot(&mut self, label: &str) -> Result<PathBuf> {
        self.driver()?.screenshot(label).await
    }

    /// Tear down whichever driver is live, best-effort.
    pub async fn close(&mut self) {
        if let Some(driver) = self.active.take() {
            if let Err(e) = driver.close().await {
                warn!(target: "hybrid", error = %e, "driver close failed");
            }
        }
    }

    fn driver(&mut self) -> Result<&mut Box<dyn ListingDriver>> {
        self.active
            .as_mut()
            .ok_or_else(|| HawkerError::Initialization("driver not initialized".into()))
    }

    /// Swap the remote session for a direct one. The old session is closed
    /// before the new one exists, preserving the at-most-one invariant.
    async fn downgrade(&mut self) -> Result<()> {
        if let Some(old) = self.active.take() {
            if let Err(e) = old.close().await {
                warn!(target: "hybrid", error = %e, "remote teardown failed, continuing");
            }
        }
        let direct = self.factory.connect_direct().await.map_err(|e| {
            HawkerError::Initialization(format!("fallback driver unavailable: {e}"))
        })?;
        self.active = Some(direct);
        self.mode = self.mode.on_failure();
        info!(target: "hybrid", mode = %self.mode, "downgraded");
        Ok(())
    }

    /// Downgrade mid-session: the fresh direct driver has no session yet,
    /// so replay the stored credentials before retrying the operation.
    async fn downgrade_and_relogin(&mut self) -> Result<()> {
        self.downgrade().await?;
        let creds = self.credentials.clone().ok_or_else(|| {
            HawkerError::Initialization("no credentials available for fallback login".into())
        })?;
        self.driver()?.login(&creds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn creds() -> Credentials {
        Credentials {
            email: "seller@example.com".into(),
            password: "pw".into(),
        }
    }

    fn data() -> ListingData {
        ListingData {
            title: "Desk".into(),
            description: "Oak desk".into(),
            price: "50".into(),
            category: "Furniture".into(),
            condition: "Used - Good".into(),
            photos: vec![],
            location: "Springfield".into(),
        }
    }

    /// Scripted driver: fails the configured operations, records calls.
    struct ScriptedDriver {
        mode: DriverMode,
        fail_login: bool,
        fail_navigate: bool,
        fail_create: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedDriver {
        fn record(&self, what: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.mode, what));
        }
    }

    #[async_trait::async_trait]
    impl ListingDriver for ScriptedDriver {
        fn mode(&self) -> DriverMode {
            self.mode
        }

        async fn login(&mut self, _creds: &Credentials) -> Result<()> {
            self.record("login");
            if self.fail_login {
                Err(HawkerError::Authentication {
                    mode: self.mode,
                    message: "scripted".into(),
                })
            } else {
                Ok(())
            }
        }

        async fn navigate_to_marketplace(&mut self) -> Result<()> {
            self.record("navigate");
            if self.fail_navigate {
                Err(HawkerError::Navigation {
                    mode: self.mode,
                    message: "scripted".into(),
                })
            } else {
                Ok(())
            }
        }

        async fn create_listing(&mut self, _data: &ListingData) -> Result<ListingResult> {
            self.record("create");
            if self.fail_create {
                Err(HawkerError::ListingCreation {
                    mode: self.mode,
                    message: "scripted".into(),
                })
            } else {
                Ok(ListingResult::ok(self.mode, "https://market.example/item/1"))
            }
        }

        async fn screenshot(&mut self, _label: &str) -> Result<PathBuf> {
            Ok(PathBuf::from("/dev/null"))
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.record("close");
            Ok(())
        }
    }

    struct ScriptedFactory {
        remote_available: bool,
        direct_available: bool,
        remote_fail_login: bool,
        remote_fail_navigate: bool,
        remote_fail_create: bool,
        direct_fail_login: bool,
        direct_fail_create: bool,
        remote_connects: AtomicUsize,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedFactory {
        fn new() -> Self {
            Self {
                remote_available: true,
                direct_available: true,
                remote_fail_login: false,
                remote_fail_navigate: false,
                remote_fail_create: false,
                direct_fail_login: false,
                direct_fail_create: false,
                remote_connects: AtomicUsize::new(0),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DriverFactory for ScriptedFactory {
        async fn connect_remote(&self) -> Result<Box<dyn ListingDriver>> {
            self.remote_connects.fetch_add(1, Ordering::SeqCst);
            if !self.remote_available {
                return Err(HawkerError::Initialization("remote down".into()));
            }
            Ok(Box::new(ScriptedDriver {
                mode: DriverMode::Remote,
                fail_login: self.remote_fail_login,
                fail_navigate: self.remote_fail_navigate,
                fail_create: self.remote_fail_create,
                calls: self.calls.clone(),
            }))
        }

        async fn connect_direct(&self) -> Result<Box<dyn ListingDriver>> {
            if !self.direct_available {
                return Err(HawkerError::Initialization("no local webdriver".into()));
            }
            Ok(Box::new(ScriptedDriver {
                mode: DriverMode::Direct,
                fail_login: self.direct_fail_login,
                fail_navigate: false,
                fail_create: self.direct_fail_create,
                calls: self.calls.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn initialize_prefers_remote() {
        let factory = Arc::new(ScriptedFactory::new());
        let mut hybrid = HybridDriver::new(factory);
        hybrid.initialize().await.unwrap();
        assert_eq!(hybrid.mode(), DriverMode::Remote);
    }

    #[tokio::test]
    async fn initialize_falls_back_to_direct() {
        let mut factory = ScriptedFactory::new();
        factory.remote_available = false;
        let mut hybrid = HybridDriver::new(Arc::new(factory));
        hybrid.initialize().await.unwrap();
        assert_eq!(hybrid.mode(), DriverMode::Direct);
    }

    #[tokio::test]
    async fn initialize_fails_when_both_unavailable() {
        let mut factory = ScriptedFactory::new();
        factory.remote_available = false;
        factory.direct_available = false;
        let mut hybrid = HybridDriver::new(Arc::new(factory));
        let err = hybrid.initialize().await.unwrap_err();
        assert!(matches!(err, HawkerError::Initialization(_)));
    }

    #[tokio::test]
    async fn login_downgrades_once_and_retries() {
        let mut factory = ScriptedFactory::new();
        factory.remote_fail_login = true;
        let factory = Arc::new(factory);
        let mut hybrid = HybridDriver::new(factory.clone());
        hybrid.initialize().await.unwrap();

        hybrid.login(&creds()).await.unwrap();
        assert_eq!(hybrid.mode(), DriverMode::Direct);
        assert_eq!(
            factory.calls(),
            vec!["remote:login", "remote:close", "direct:login"]
        );
    }

    #[tokio::test]
    async fn second_login_failure_propagates() {
        let mut factory = ScriptedFactory::new();
        factory.remote_fail_login = true;
        factory.direct_fail_login = true;
        let mut hybrid = HybridDriver::new(Arc::new(factory));
        hybrid.initialize().await.unwrap();

        let err = hybrid.login(&creds()).await.unwrap_err();
        match err {
            HawkerError::Authentication { mode, .. } => assert_eq!(mode, DriverMode::Direct),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn create_listing_downgrade_replays_login() {
        let mut factory = ScriptedFactory::new();
        factory.remote_fail_create = true;
        let factory = Arc::new(factory);
        let mut hybrid = HybridDriver::new(factory.clone());
        hybrid.initialize().await.unwrap();
        hybrid.login(&creds()).await.unwrap();

        let result = hybrid.create_listing(&data()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.method, DriverMode::Direct);
        assert_eq!(
            factory.calls(),
            vec![
                "remote:login",
                "remote:create",
                "remote:close",
                "direct:login",
                "direct:create",
            ]
        );
    }

    #[tokio::test]
    async fn navigate_downgrade_is_monotonic() {
        let mut factory = ScriptedFactory::new();
        factory.remote_fail_navigate = true;
        factory.direct_fail_create = true;
        let factory = Arc::new(factory);
        let mut hybrid = HybridDriver::new(factory.clone());
        hybrid.initialize().await.unwrap();
        hybrid.login(&creds()).await.unwrap();

        hybrid.navigate_to_marketplace().await.unwrap();
        assert_eq!(hybrid.mode(), DriverMode::Direct);

        // Direct failures no longer trigger any remote attempt.
        let err = hybrid.create_listing(&data()).await.unwrap_err();
        assert!(matches!(err, HawkerError::ListingCreation { .. }));
        assert_eq!(hybrid.mode(), DriverMode::Direct);
        assert_eq!(factory.remote_connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn downgrade_without_fallback_surfaces_initialization_error() {
        let mut factory = ScriptedFactory::new();
        factory.remote_fail_create = true;
        factory.direct_available = false;
        let mut hybrid = HybridDriver::new(Arc::new(factory));
        hybrid.initialize().await.unwrap();
        hybrid.login(&creds()).await.unwrap();

        let err = hybrid.create_listing(&data()).await.unwrap_err();
        assert!(matches!(err, HawkerError::Initialization(_)));
    }
}
