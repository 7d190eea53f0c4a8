//! Data layer: parsed prediction results and the what-if simulation core.
//!
//! ```text
//!  result CSV (download_url body)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  table    │  parse text → ResultTable { headers, rows }
//!   └──────────┘
//!        │ row selection
//!        ▼
//!   ┌──────────┐
//!   │ simulate  │  editable features → backend → risk delta
//!   └──────────┘
//! ```

pub mod simulate;
pub mod table;
