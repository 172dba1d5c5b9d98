//! Client-side pieces of the site: the contact form state machine with its transport to the
//! submission endpoint, and the featured image carousel.

pub mod carousel;
pub mod contact_form;
pub mod transport;
