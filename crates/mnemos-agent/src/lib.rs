// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent core: deterministic prompt assembly, the tool-calling
//! orchestrator, session control (`/new`, `/reset`), and the top-level
//! [`App`] that wires storage, clients, memory, tools, and the
//! scheduler together.

pub mod app;
pub mod assembler;
pub mod orchestrator;
pub mod session;

pub use app::App;
pub use assembler::{CurrentRequest, PromptAssembler};
pub use orchestrator::Orchestrator;
pub use session::SessionControl;
