//! Target-site URLs and the post-submit classification heuristic.

pub const LOGIN_URL: &str = "https://www.facebook.com/login";
pub const HOME_URL: &str = "https://www.facebook.com";
pub const MARKETPLACE_URL: &str = "https://www.facebook.com/marketplace";
pub const MARKETPLACE_CREATE_URL: &str = "https://www.facebook.com/marketplace/create";
pub const MARKETPLACE_CREATE_ITEM_URL: &str = "https://www.facebook.com/marketplace/create/item";

/// URL fragment marking an additional-verification interstitial.
pub const CHECKPOINT_FRAGMENT: &str = "/checkpoint/";

/// Classify a post-submit URL. The site gives no positive confirmation, so
/// success is inferred from the shape: we must have left the creation flow
/// but still be inside the marketplace. False negatives are possible (the
/// listing may exist even when this returns false); treat the verdict as a
/// heuristic, not a contract.
pub fn classify_submission(url: &str) -> bool {
    url.contains("marketplace") && !url.contains("create")
}

/// Did this URL land on a login or checkpoint surface rather than a
/// logged-in page?
pub fn looks_logged_out(url: &str) -> bool {
    url.contains("/login") || url.contains(CHECKPOINT_FRAGMENT)
}
