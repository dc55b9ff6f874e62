use clap::ValueEnum;

/// The `--sink` flag shared by every worker binary (§6): which of the Dual
/// Sink's two fan-out destinations to actually write. `Dual` is the
/// production default — JSONL and SQLite receive identical records and their
/// counters are diffed for parity (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    Jsonl,
    Sqlite,
    Dual,
}

impl SinkKind {
    pub fn wants_jsonl(self) -> bool {
        matches!(self, SinkKind::Jsonl | SinkKind::Dual)
    }

    pub fn wants_sqlite(self) -> bool {
        matches!(self, SinkKind::Sqlite | SinkKind::Dual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_wants_both_backends() {
        assert!(SinkKind::Dual.wants_jsonl());
        assert!(SinkKind::Dual.wants_sqlite());
    }

    #[test]
    fn single_backends_only_want_themselves() {
        assert!(SinkKind::Jsonl.wants_jsonl());
        assert!(!SinkKind::Jsonl.wants_sqlite());
        assert!(!SinkKind::Sqlite.wants_jsonl());
        assert!(SinkKind::Sqlite.wants_sqlite());
    }
}
