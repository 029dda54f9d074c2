mod vendors;

pub use vendors::{VendorDescriptor, detect};
