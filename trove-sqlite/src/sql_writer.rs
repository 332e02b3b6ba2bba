use trove_core::{SqlWriter, separated_by};

/// Writer for the SQLite dialect: double quoted identifiers, `?` placeholders and
/// `ON CONFLICT` upserts reading the rejected row from `excluded`.
#[derive(Default, Clone, Copy, Debug)]
pub struct SqliteSqlWriter {}

impl SqliteSqlWriter {
    pub const fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_upsert_fragment(&self, out: &mut String, columns: &[&str]) {
        let Some((pk, rest)) = columns.split_first() else {
            return;
        };
        out.push_str(" ON CONFLICT(");
        self.write_identifier_quoted(out, pk);
        out.push(')');
        if rest.is_empty() {
            out.push_str(" DO NOTHING");
            return;
        }
        out.push_str(" DO UPDATE SET ");
        separated_by(
            out,
            rest,
            |out, v| {
                self.write_identifier_quoted(out, v);
                out.push_str(" = excluded.");
                self.write_identifier_quoted(out, v);
            },
            ", ",
        );
    }
}
