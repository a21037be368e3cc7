//! Wire data model for the murmur realtime conversation protocol.
//!
//! Pure data and pure functions — no I/O, no concurrency:
//!
//! ```text
//! ClientEvent ── encode() ──→ JSON wire envelope
//! JSON wire envelope ── classify() ──→ ServerEvent (open set, Opaque fallback)
//! SessionConfig ←─ reconcile() ─── RemoteSession echo
//! ```
//!
//! ## Crate Position
//!
//! Standalone (no murmur crate dependencies).
//! Depended on by: murmur-realtime.

pub mod client;
pub mod config;
pub mod item;
pub mod server;

pub use client::{ClientEvent, ResponseOverrides};
pub use config::{
    AudioFormat, Modality, RemoteSession, SessionConfig, ToolChoice, ToolChoicePreset,
    ToolDefinition, TranscriptionOptions, TurnDetection,
};
pub use item::{ContentPart, ConversationItem, ItemKind, ItemRole};
pub use server::{classify, ErrorBody, ResponseBody, ServerEvent, KNOWN_TYPES};
