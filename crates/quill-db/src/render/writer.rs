//! The statement renderer.

use rusqlite::types::Value;

use super::{inline_value, quote_ident, Placeholder, RenderOptions};
use crate::{
    error::{DbError, Result},
    expr::{
        ops::prec, Call, ColumnRef, Expr, ExprNode, Over, TableRef, TableSource, Window,
    },
    query::{
        Compiled, Compound, CreateTable, Delete, Insert, InsertSource, OrderTerm, Query, Select, Update,
        UpsertAction,
    },
    resolve::resolve_joins,
};

pub(crate) struct Renderer<'o> {
    options: &'o RenderOptions,
    sql: String,
    params: Vec<Value>,
    /// Tables visible to column references, innermost last.
    scopes: Vec<Vec<TableRef>>,
    /// Inline literals instead of binding them.
    inline: bool,
    /// Render columns unqualified.
    bare: bool,
}

impl<'o> Renderer<'o> {
    pub fn new(options: &'o RenderOptions, inline: bool) -> Self {
        Self {
            options,
            sql: String::new(),
            params: Vec::new(),
            scopes: Vec::new(),
            inline,
            bare: false,
        }
    }

    pub fn finish(self) -> Compiled {
        Compiled {
            sql: self.sql,
            params: self.params,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        let quoted = quote_ident(name);
        self.sql.push_str(&quoted);
    }

    fn bind(&mut self, value: &Value) {
        if self.inline {
            let literal = inline_value(value);
            self.push(&literal);
            return;
        }
        self.params.push(value.clone());
        match self.options.placeholder {
            Placeholder::Question => self.sql.push('?'),
            Placeholder::Numbered => {
                let placeholder = format!("?{}", self.params.len());
                self.push(&placeholder);
            }
        }
    }

    fn visible_tables(&self) -> usize {
        self.scopes.iter().map(Vec::len).sum()
    }

    fn with_scope<T>(&mut self, tables: Vec<TableRef>, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scopes.push(tables);
        let result = f(self);
        self.scopes.pop();
        result
    }

    /// Renders a derived table without the enclosing scopes.
    fn isolated<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::take(&mut self.scopes);
        let result = f(self);
        self.scopes = saved;
        result
    }

    fn bare<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.bare, true);
        let result = f(self);
        self.bare = saved;
        result
    }

    fn list<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T) -> Result<()>) -> Result<()> {
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 {
                self.push(", ");
            }
            f(self, item)?;
        }
        Ok(())
    }

    fn column(&mut self, column: &ColumnRef) {
        let table = &column.table;
        let qualify = match table.source() {
            TableSource::Declaring(_) => false,
            TableSource::Excluded(_) => true,
            _ => !self.bare && (table.is_aliased() || self.visible_tables() > 1),
        };
        if qualify {
            self.ident(table.visible_name());
            self.sql.push('.');
        }
        self.ident(&column.name);
    }

    /// Renders `expr`, parenthesized when it binds looser than `min`.
    fn operand(&mut self, expr: &Expr, min: u8) -> Result<()> {
        if expr.node().precedence() < min {
            self.sql.push('(');
            self.expr(expr)?;
            self.sql.push(')');
            Ok(())
        } else {
            self.expr(expr)
        }
    }

    pub fn expr(&mut self, expr: &Expr) -> Result<()> {
        match expr.node() {
            ExprNode::Column(column) => self.column(column),
            ExprNode::Literal(value) => self.bind(value),
            ExprNode::Raw(sql) => self.push(sql),
            ExprNode::Star => self.sql.push('*'),
            ExprNode::Unary { op, operand } => {
                self.push(op.as_sql());
                let start = self.sql.len();
                self.operand(operand, prec::ATOM)?;
                // `--` opens a line comment
                if self.sql[..start].ends_with('-') && self.sql[start..].starts_with('-') {
                    self.sql.insert(start, ' ');
                }
            }
            ExprNode::Binary { op, left, right } => {
                let p = op.precedence();
                self.operand(left, p)?;
                self.sql.push(' ');
                self.push(op.as_sql());
                self.sql.push(' ');
                // only a chain of the same operator regroups freely
                let chained = op.is_associative()
                    && matches!(right.node(), ExprNode::Binary { op: r, .. } if r == op);
                self.operand(right, if chained { p } else { p + 1 })?;
            }
            ExprNode::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.operand(expr, prec::RELATIONAL)?;
                self.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.operand(low, prec::RELATIONAL)?;
                self.push(" AND ");
                self.operand(high, prec::RELATIONAL)?;
            }
            ExprNode::InList {
                expr,
                list,
                negated,
            } => {
                self.operand(expr, prec::RELATIONAL)?;
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                self.list(list, |r, e| r.expr(e))?;
                self.sql.push(')');
            }
            ExprNode::InQuery {
                expr,
                query,
                negated,
            } => {
                self.operand(expr, prec::RELATIONAL)?;
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                self.query(query)?;
                self.sql.push(')');
            }
            ExprNode::IsNull { expr, negated } => {
                self.operand(expr, prec::RELATIONAL)?;
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            ExprNode::Exists(query) => {
                self.push("EXISTS (");
                self.query(query)?;
                self.sql.push(')');
            }
            ExprNode::Call(call) => self.call(call)?,
            ExprNode::Window { call, over } => {
                self.call(call)?;
                self.push(" OVER ");
                match over {
                    Over::Named(name) => self.ident(name),
                    Over::Inline(window) => {
                        self.sql.push('(');
                        self.window(window)?;
                        self.sql.push(')');
                    }
                }
            }
            ExprNode::Alias { name, .. } => self.ident(name),
            ExprNode::Subquery(query) => {
                self.sql.push('(');
                self.query(query)?;
                self.sql.push(')');
            }
            ExprNode::Tuple(items) => {
                self.sql.push('(');
                self.list(items, |r, e| r.expr(e))?;
                self.sql.push(')');
            }
            ExprNode::Invalid(reason) => return Err(DbError::Construction(reason.clone())),
        }
        Ok(())
    }

    fn call(&mut self, call: &Call) -> Result<()> {
        self.push(&call.name);
        self.sql.push('(');
        if call.distinct {
            self.push("DISTINCT ");
        }
        self.list(&call.args, |r, e| r.expr(e))?;
        self.sql.push(')');
        Ok(())
    }

    fn window(&mut self, window: &Window) -> Result<()> {
        let mut parts = 0;
        if !window.partition_by.is_empty() {
            self.push("PARTITION BY ");
            self.list(&window.partition_by, |r, e| r.expr(e))?;
            parts += 1;
        }
        if !window.order_by.is_empty() {
            if parts > 0 {
                self.sql.push(' ');
            }
            self.order_terms(&window.order_by)?;
            parts += 1;
        }
        if let Some(frame) = &window.frame {
            if parts > 0 {
                self.sql.push(' ');
            }
            let frame = frame.to_string();
            self.push(&frame);
        }
        Ok(())
    }

    fn order_terms(&mut self, terms: &[OrderTerm]) -> Result<()> {
        self.push("ORDER BY ");
        self.list(terms, |r, term| {
            r.expr(&term.expr)?;
            if term.desc {
                r.push(" DESC");
            }
            Ok(())
        })
    }

    fn limit(&mut self, limit: Option<u32>, offset: Option<u32>) {
        match (limit, offset) {
            (Some(limit), Some(offset)) => self.push(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => self.push(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => self.push(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
    }

    fn table_source(&mut self, table: &TableRef) -> Result<()> {
        match table.source() {
            TableSource::Query(query) => {
                self.sql.push('(');
                self.isolated(|r| r.query(query))?;
                self.push(") AS ");
                self.ident(table.visible_name());
            }
            _ => {
                self.ident(table.table_name());
                if let Some(alias) = table.alias_name() {
                    self.push(" AS ");
                    self.ident(alias);
                }
            }
        }
        Ok(())
    }

    pub fn query(&mut self, query: &Query) -> Result<()> {
        match query {
            Query::Select(select) => self.select(select, false),
            Query::Compound(compound) => self.compound(compound, false),
        }
    }

    /// Renders a SELECT; `force_where` adds `WHERE true` when no predicate
    /// was given.
    pub fn select(&mut self, select: &Select, force_where: bool) -> Result<()> {
        let data = select.data();
        let source = select.source();
        let joins = resolve_joins(source.as_ref(), &data.joins)?;

        let mut tables: Vec<TableRef> = source.iter().cloned().collect();
        tables.extend(joins.iter().map(|j| j.table.clone()));

        self.with_scope(tables, |r| {
            r.push("SELECT ");
            if data.distinct {
                r.push("DISTINCT ");
            }
            r.list(&data.columns, |r, column| match column.node() {
                ExprNode::Alias { expr, name } => {
                    r.expr(expr)?;
                    r.push(" AS ");
                    r.ident(name);
                    Ok(())
                }
                _ => r.expr(column),
            })?;

            if let Some(source) = &source {
                r.push(" FROM ");
                r.table_source(source)?;
            }
            for join in &joins {
                r.sql.push(' ');
                r.push(join.kind.as_sql());
                r.sql.push(' ');
                r.table_source(&join.table)?;
                if let Some(on) = &join.on {
                    r.push(" ON ");
                    r.expr(on)?;
                }
            }

            match &data.filter {
                Some(filter) => {
                    r.push(" WHERE ");
                    r.expr(filter)?;
                }
                None if force_where => r.push(" WHERE true"),
                None => {}
            }
            if !data.group_by.is_empty() {
                r.push(" GROUP BY ");
                r.list(&data.group_by, |r, e| r.expr(e))?;
            }
            if let Some(having) = &data.having {
                r.push(" HAVING ");
                r.expr(having)?;
            }
            if !data.windows.is_empty() {
                r.push(" WINDOW ");
                r.list(&data.windows, |r, def| {
                    r.ident(&def.name);
                    r.push(" AS (");
                    r.window(&def.window)?;
                    r.sql.push(')');
                    Ok(())
                })?;
            }
            if !data.order_by.is_empty() {
                r.sql.push(' ');
                r.order_terms(&data.order_by)?;
            }
            r.limit(data.limit, data.offset);
            Ok(())
        })
    }

    /// Renders a compound; `force_where` applies to the last operand.
    pub fn compound(&mut self, compound: &Compound, force_where: bool) -> Result<()> {
        let data = compound.data();
        self.query(&data.left)?;
        self.sql.push(' ');
        self.push(data.op.as_sql());
        self.sql.push(' ');
        self.select(&data.right, force_where)?;

        if !data.order_by.is_empty() {
            self.push(" ORDER BY ");
            self.list(&data.order_by, |r, term| {
                let name = term.expr.output_name().ok_or_else(|| {
                    DbError::Construction(
                        "compound ORDER BY terms must name an output column".into(),
                    )
                })?;
                r.ident(name);
                if term.desc {
                    r.push(" DESC");
                }
                Ok(())
            })?;
        }
        self.limit(data.limit, data.offset);
        Ok(())
    }

    pub fn insert(&mut self, insert: &Insert) -> Result<()> {
        let data = insert.data();
        self.push("INSERT");
        if let Some(policy) = data.policy {
            self.push(&format!(" OR {policy}"));
        }
        self.push(" INTO ");
        self.ident(data.table.table_name());

        match &data.source {
            InsertSource::Values(rows) if rows.is_empty() => self.push(" DEFAULT VALUES"),
            InsertSource::Values(rows) => {
                self.column_list(&data.columns);
                self.push(" VALUES ");
                self.list(rows, |r, row| {
                    r.sql.push('(');
                    r.list(row, |r, e| r.expr(e))?;
                    r.sql.push(')');
                    Ok(())
                })?;
            }
            InsertSource::Query(query) => {
                self.column_list(&data.columns);
                self.sql.push(' ');
                let force_where = data.upsert.is_some();
                match query {
                    Query::Select(select) => self.select(select, force_where)?,
                    Query::Compound(compound) => self.compound(compound, force_where)?,
                }
            }
        }

        if let Some(upsert) = &data.upsert {
            self.push(" ON CONFLICT");
            if !upsert.target.is_empty() {
                self.push(" (");
                self.bare(|r| r.list(&upsert.target, |r, e| r.expr(e)))?;
                self.sql.push(')');
            }
            match &upsert.action {
                UpsertAction::Nothing => self.push(" DO NOTHING"),
                UpsertAction::Update {
                    assignments,
                    filter,
                } => {
                    self.push(" DO UPDATE SET ");
                    let tables = vec![data.table.clone()];
                    self.with_scope(tables, |r| {
                        r.list(assignments, |r, a| {
                            r.bare(|r| r.expr(&a.column))?;
                            r.push(" = ");
                            r.expr(&a.value)
                        })?;
                        if let Some(filter) = filter {
                            r.push(" WHERE ");
                            r.expr(filter)?;
                        }
                        Ok(())
                    })?;
                }
            }
        }
        Ok(())
    }

    fn column_list(&mut self, columns: &[String]) {
        self.push(" (");
        for (idx, column) in columns.iter().enumerate() {
            if idx > 0 {
                self.push(", ");
            }
            self.ident(column);
        }
        self.sql.push(')');
    }

    pub fn update(&mut self, update: &Update) -> Result<()> {
        let data = update.data();
        self.push("UPDATE");
        if let Some(policy) = data.policy {
            self.push(&format!(" OR {policy}"));
        }
        self.sql.push(' ');
        self.table_source(&data.table)?;
        self.push(" SET ");
        self.with_scope(vec![data.table.clone()], |r| {
            r.list(&data.assignments, |r, a| {
                r.bare(|r| r.expr(&a.column))?;
                r.push(" = ");
                r.expr(&a.value)
            })?;
            if let Some(filter) = &data.filter {
                r.push(" WHERE ");
                r.expr(filter)?;
            }
            Ok(())
        })
    }

    pub fn create_table(&mut self, create: &CreateTable) -> Result<()> {
        let sql = super::ddl::create_table(create)?;
        self.push(&sql);
        Ok(())
    }

    pub fn delete(&mut self, delete: &Delete) -> Result<()> {
        let data = delete.data();
        self.push("DELETE FROM ");
        self.table_source(&data.table)?;
        self.with_scope(vec![data.table.clone()], |r| {
            if let Some(filter) = &data.filter {
                r.push(" WHERE ");
                r.expr(filter)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        expr::{constant, func::count, lit, raw},
        schema::{ColumnDef, TableSchema},
    };

    fn table(name: &str) -> TableRef {
        TableRef::new(Arc::new(
            TableSchema::builder(name)
                .column(ColumnDef::of::<i64>("a"))
                .column(ColumnDef::of::<i64>("b"))
                .build(),
        ))
    }

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let options = RenderOptions::default();
        let mut renderer = Renderer::new(&options, false);
        renderer.scopes.push(vec![table("T")]);
        renderer.expr(expr).unwrap();
        renderer.finish().into_parts()
    }

    #[test]
    fn test_parenthesize_only_when_needed() {
        let t = table("T");
        let (a, b) = (t.col("a"), t.col("b"));

        assert_eq!(render(&(a.eq(1) & b.eq(2) | a.eq(3))).0, "a = ? AND b = ? OR a = ?");
        assert_eq!(render(&(a.eq(1) & (b.eq(2) | a.eq(3)))).0, "a = ? AND (b = ? OR a = ?)");
        assert_eq!(render(&((&a + &b) * 2)).0, "(a + b) * ?");
        assert_eq!(render(&(&a - (&b - 1))).0, "a - (b - ?)");
        assert_eq!(render(&(&a + (&b + 1))).0, "a + b + ?");
        assert_eq!(render(&(&a - &b - 1)).0, "a - b - ?");
        assert_eq!(render(&(a.eq(1) & (b.eq(2) & a.eq(3)))).0, "a = ? AND b = ? AND a = ?");
    }

    #[test]
    fn test_mixed_operators_at_one_level_keep_grouping() {
        let t = table("T");
        let (a, b) = (t.col("a"), t.col("b"));

        assert_eq!(render(&(&a * (&b / 3))).0, "a * (b / ?)");
        assert_eq!(render(&(&a * (&b % 3))).0, "a * (b % ?)");
        assert_eq!(render(&(&a + (&b - 1))).0, "a + (b - ?)");
        assert_eq!(render(&(&a * (&b * 3))).0, "a * b * ?");
        assert_eq!(render(&(&a * &b / 3)).0, "a * b / ?");
    }

    #[test]
    fn test_not_and_negation() {
        let t = table("T");
        let a = t.col("a");

        assert_eq!(render(&!a.eq(1)).0, "NOT (a = ?)");
        assert_eq!(render(&!a.null()).0, "NOT (a IS NULL)");
        assert_eq!(render(&-(&a + 1)).0, "-(a + ?)");
        assert_eq!(render(&(-a.clone())).0, "-a");
    }

    #[test]
    fn test_negating_a_negative_constant_is_not_a_comment() {
        let t = table("T");

        assert_eq!(render(&-constant(-5)).0, "- -5");
        assert_eq!(render(&-constant(5)).0, "-5");
        assert_eq!(render(&(t.col("a") - constant(-5))).0, "a - -5");
    }

    #[test]
    fn test_params_in_order() {
        let t = table("T");
        let e = t.col("a").between(1, 5) & t.col("b").in_([7, 8]);
        let (sql, params) = render(&e);
        assert_eq!(sql, "a BETWEEN ? AND ? AND b IN (?, ?)");
        assert_eq!(
            params,
            vec![
                Value::Integer(1),
                Value::Integer(5),
                Value::Integer(7),
                Value::Integer(8)
            ]
        );
    }

    #[test]
    fn test_numbered_placeholders() {
        let t = table("T");
        let options = RenderOptions::numbered();
        let mut renderer = Renderer::new(&options, false);
        renderer.expr(&(t.col("a").eq(1) | t.col("b").eq(2))).unwrap();
        assert_eq!(renderer.finish().sql, "a = ?1 OR b = ?2");
    }

    #[test]
    fn test_raw_and_count_star() {
        assert_eq!(render(&raw("true")).0, "true");
        assert_eq!(render(&count()).0, "COUNT(*)");
        assert_eq!(render(&lit("x").concat("y")).0, "? || ?");
    }

    #[test]
    fn test_qualification() {
        let t = table("T");
        let options = RenderOptions::default();
        let mut renderer = Renderer::new(&options, false);
        renderer.scopes.push(vec![t.clone(), table("U")]);
        renderer.expr(&t.col("a")).unwrap();
        assert_eq!(renderer.finish().sql, "T.a");

        let x = t.alias("x");
        assert_eq!(render(&x.col("a")).0, "x.a");
    }
}
