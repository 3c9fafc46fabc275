//! Browser plumbing shared by both drivers: client construction, page and
//! element helpers, and human-like pacing.

pub mod behavioral;
pub mod driver;
pub mod page;

pub use behavioral::BehavioralEngine;
pub use driver::Browser;
pub use page::{Page, PageElement};
