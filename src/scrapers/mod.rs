//! Agency scrapers.
//!
//! Each agency publishes its data differently:
//!
//! | Agency | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | CDC | [`cdc`] | CSV download | Re-emitted with the source header |
//! | ECDC | [`ecdc`] | HTML scraping | JSON embedded in `<script>` per division |
//! | PAHO | [`paho`] | HTML polling | Download links appear late; polled with backoff |
//! | WHO | [`who`] | JSON POST | `Data` list of flat objects |
//!
//! [`html`] holds the shared parsing helpers.

pub mod cdc;
pub mod ecdc;
pub mod html;
pub mod paho;
pub mod who;

#[cfg(test)]
pub(crate) mod testing;
