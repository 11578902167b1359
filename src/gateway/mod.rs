// Gateway module - Bridge boundary
// Delivers withdrawal intents produced by committed batches to the external bridge

mod relay;

pub use relay::*;
