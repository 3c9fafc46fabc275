//! Ordered locator chains for every logical target on the site.
//!
//! UI drift is the main failure mode of this whole system, so the chains
//! are data, not code: each one is an ordered list of CSS candidates tried
//! in sequence with the first match short-circuiting. The built-in defaults
//! below mirror what the target site has looked like in practice; a
//! deployment can override any of them from a YAML/JSON file without a
//! rebuild.

use serde::{Deserialize, Serialize};

/// An ordered list of candidate CSS selectors for one logical target.
/// Evaluation order is the declaration order; the first selector that
/// resolves an element wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SelectorChain(pub Vec<String>);

impl SelectorChain {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(candidates.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for SelectorChain {
    fn from(candidates: [&str; N]) -> Self {
        Self::new(candidates)
    }
}

/// The full set of chains the remote driver guesses with, plus the text
/// fragments used where the site offers nothing better than button labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorBook {
    // Login page
    pub login_email: SelectorChain,
    pub login_password: SelectorChain,
    pub login_submit: SelectorChain,
    pub login_errors: SelectorChain,

    // Post-login interstitials
    pub challenge_indicators: SelectorChain,
    pub dialog_close: SelectorChain,
    /// Lowercased button labels that dismiss an interstitial.
    pub dismiss_texts: Vec<String>,
    pub login_success: SelectorChain,

    // Marketplace navigation
    pub marketplace_links: SelectorChain,

    // Listing form
    pub form_title: SelectorChain,
    pub form_price: SelectorChain,
    pub form_description: SelectorChain,
    pub form_location: SelectorChain,
    pub form_category: SelectorChain,
    pub category_options: SelectorChain,
    pub image_input: SelectorChain,
    pub submit_listing: SelectorChain,
}

impl Default for SelectorBook {
    fn default() -> Self {
        Self {
            login_email: [
                "#email",
                "input[name='email']",
                "input[type='email']",
                "input[placeholder*='email' i]",
                "input[aria-label*='email' i]",
            ]
            .into(),
            login_password: [
                "#pass",
                "input[name='pass']",
                "input[type='password']",
                "input[placeholder*='password' i]",
                "input[aria-label*='password' i]",
            ]
            .into(),
            login_submit: [
                "button[name='login']",
                "button[data-testid='royal_login_button']",
                "button[type='submit']",
                "input[type='submit']",
            ]
            .into(),
            login_errors: [
                "[data-testid='royal_login_error']",
                ".login_error_box",
                "[role='alert']",
                "div[id*='error']",
                "div[data-testid='login_error']",
            ]
            .into(),
            challenge_indicators: [
                "div[role='dialog']",
                "[data-testid='checkpoint_title']",
                "input[name='approvals_code']",
                "input[type='password']:not([name='pass'])",
            ]
            .into(),
            dialog_close: [
                "button[aria-label='Close']",
                "button[aria-label*='close' i]",
                "div[role='dialog'] [data-testid*='close']",
                "div[role='dialog'] svg[aria-label='Close']",
            ]
            .into(),
            dismiss_texts: ["continue", "skip", "not now", "maybe later", "cancel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            login_success: [
                "[data-testid='facebook_logo']",
                "div[role='navigation']",
                "a[href*='/marketplace']",
                "a[href*='/profile']",
                "div[aria-label*='Account']",
                "img[alt*='profile']",
                "div[role='main']",
            ]
            .into(),
            marketplace_links: [
                "a[href*='/marketplace']",
                "a[aria-label*='Marketplace']",
                "div[data-testid*='marketplace']",
            ]
            .into(),
            form_title: [
                "input[placeholder*='title' i]",
                "input[aria-label*='title' i]",
                "input[name*='title']",
                "textarea[placeholder*='title' i]",
            ]
            .into(),
            form_price: [
                "input[placeholder*='price' i]",
                "input[aria-label*='price' i]",
                "input[name*='price']",
                "input[type='number']",
            ]
            .into(),
            form_description: [
                "textarea[placeholder*='description' i]",
                "textarea[aria-label*='description' i]",
                "textarea[name*='description']",
                "div[contenteditable='true']",
            ]
            .into(),
            form_location: [
                "input[placeholder*='location' i]",
                "input[aria-label*='location' i]",
                "input[name*='location']",
            ]
            .into(),
            form_category: [
                "select[name*='category']",
                "div[role='combobox']",
                "button[aria-haspopup='listbox']",
                "input[placeholder*='category' i]",
            ]
            .into(),
            category_options: ["div[role='option']", "li[role='option']", "option"].into(),
            image_input: ["input[type='file']", "input[accept*='image']"].into(),
            submit_listing: [
                "button[type='submit']",
                "input[type='submit']",
                "div[aria-label*='Publish' i]",
            ]
            .into(),
        }
    }
}

/// Fixed selectors the direct driver relies on. These are not chains: the
/// direct driver trades drift-tolerance for determinism.
pub mod fixed {
    pub const EMAIL: &str = "#email";
    pub const PASSWORD: &str = "#pass";
    pub const LOGIN_BUTTON: &str = "#loginbutton";

    pub const CREATE_LISTING_MARKER: &str = "[data-testid='marketplace-create-listing']";
    pub const HOME_FEED_MARKER: &str = "[data-testid='marketplace_home_feed']";
    pub const SELL_LINK: &str = "a[href*='/marketplace/create']";
    pub const SELL_LINK_ARIA: &str = "a[aria-label*='Sell' i]";

    pub const FILE_INPUT: &str = "input[type='file']";
    pub const MEDIA_PREVIEW: &str = "[data-testid='marketplace-media-preview']";

    pub const TITLE_INPUT: &str = "input[name='title']";
    pub const PRICE_INPUT: &str = "input[name='price']";
    pub const DESCRIPTION_INPUT: &str = "textarea[name='description']";

    pub const CATEGORY_SELECTOR: &str = "[data-testid='marketplace-category-selector']";
    pub const CONDITION_SELECTOR: &str = "[data-testid='marketplace-condition-selector']";
    pub const DROPDOWN_MENU: &str = "[role='menu']";
    pub const DROPDOWN_ITEMS: &str = "[role='menuitemradio']";

    pub const LOCATION_SELECTOR: &str = "[data-testid='marketplace-location-selector']";
    pub const LOCATION_OPTION: &str = "[role='option']";

    pub const PUBLISH_BUTTON: &str = "[data-testid='marketplace-publish-button']";
    pub const SUCCESS_DIALOG: &str = "[data-testid='marketplace-success-dialog']";
    pub const SUCCESS_DIALOG_LINK: &str = "[data-testid='marketplace-success-dialog'] a";

    /// Logged-in indicators used by the cookie-restore path.
    pub const LOGGED_IN: [&str; 8] = [
        "[data-testid='user-menu-button']",
        "[aria-label*='Account']",
        "[aria-label*='Profile']",
        "div[role='button'][aria-label*='Account']",
        "a[href*='/me']",
        "[data-testid='nav-user-menu']",
        "a[href*='facebook.com/profile.php']",
        "div[aria-label*='Your profile']",
    ];
}
