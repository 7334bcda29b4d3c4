// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod render;
pub mod session;
pub mod transcript;

pub use render::*;
pub use session::*;
pub use transcript::*;
