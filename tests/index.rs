#[path = "util/mod.rs"]
#[macro_use]
mod util;

mod slot;
mod spawn;
