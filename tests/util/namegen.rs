use super::Xorshift32;

/// Endless supply of socket paths for listeners to try claiming, seeded per test site.
#[derive(Copy, Clone, Debug)]
pub struct NameGen {
    rng: Xorshift32,
}
impl NameGen {
    pub fn new(id: &'static str) -> Self {
        Self { rng: Xorshift32::from_id(id) }
    }
}
impl Iterator for NameGen {
    type Item = String;
    fn next(&mut self) -> Option<Self::Item> {
        Some(format!("/tmp/underbus-test-{:08x}.sock", self.rng.next()))
    }
}

macro_rules! make_id {
    () => {
        concat!(file!(), line!(), column!())
    };
}
