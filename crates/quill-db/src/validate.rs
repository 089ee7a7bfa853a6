//! Statement validation.
//!
//! Runs before rendering so that a malformed statement never produces SQL.

use rusqlite::types::Value;

use crate::{
    error::{DbError, Result},
    expr::{Call, Expr, ExprNode, FuncRole, Over, TableRef, TableSource, Window, WindowDef},
    query::{
        Assignment, Compound, CreateTable, Delete, Insert, InsertSource, OrderTerm, Query, Select,
        StatementRef, Update, UpsertAction,
    },
    resolve::resolve_joins,
    schema::Domain,
};

/// Where an expression sits, and what it may contain there.
#[derive(Clone, Copy)]
struct Ctx<'a> {
    clause: &'static str,
    aggregates: bool,
    windows: bool,
    excluded: bool,
    in_aggregate: bool,
    named_windows: &'a [WindowDef],
}

impl<'a> Ctx<'a> {
    fn plain(clause: &'static str) -> Self {
        Self {
            clause,
            aggregates: false,
            windows: false,
            excluded: false,
            in_aggregate: false,
            named_windows: &[],
        }
    }

    fn grouped(clause: &'static str, named_windows: &'a [WindowDef], windows: bool) -> Self {
        Self {
            aggregates: true,
            windows,
            named_windows,
            ..Self::plain(clause)
        }
    }
}

pub(crate) fn validate(statement: &StatementRef<'_>) -> Result<()> {
    let mut validator = Validator::default();
    match statement {
        StatementRef::Query(query) => validator.query(query),
        StatementRef::Select(select) => validator.select(select),
        StatementRef::Compound(compound) => validator.compound(compound),
        StatementRef::Insert(insert) => validator.insert(insert),
        StatementRef::Update(update) => validator.update(update),
        StatementRef::Delete(delete) => validator.delete(delete),
        StatementRef::CreateTable(create) => validator.create_table(create),
    }
}

#[derive(Default)]
struct Validator {
    scopes: Vec<Vec<TableRef>>,
}

impl Validator {
    fn scoped(&mut self, tables: Vec<TableRef>, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.scopes.push(tables);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn visible(&self, table: &TableRef) -> bool {
        self.scopes.iter().flatten().any(|t| t.same_as(table))
    }

    fn query(&mut self, query: &Query) -> Result<()> {
        match query {
            Query::Select(select) => self.select(select),
            Query::Compound(compound) => self.compound(compound),
        }
    }

    /// Declared tables are checked wherever they are used, not only when
    /// created.
    fn declared(&self, table: &TableRef) -> Result<()> {
        match table.source() {
            TableSource::Table(schema) => schema.validate(),
            _ => Ok(()),
        }
    }

    /// Derived tables see none of the enclosing scopes.
    fn derived(&mut self, table: &TableRef) -> Result<()> {
        match table.query() {
            Some(query) => Validator::default().query(query),
            None => Ok(()),
        }
    }

    fn select(&mut self, select: &Select) -> Result<()> {
        let data = select.data();
        if data.columns.is_empty() {
            return Err(DbError::Construction(
                "a SELECT needs at least one output column".into(),
            ));
        }

        let source = select.source();
        if let Some(source) = &source {
            self.declared(source)?;
            self.derived(source)?;
        }
        let joins = resolve_joins(source.as_ref(), &data.joins)?;
        for join in &joins {
            self.declared(&join.table)?;
            self.derived(&join.table)?;
        }

        for (idx, def) in data.windows.iter().enumerate() {
            if data.windows[..idx].iter().any(|d| d.name == def.name) {
                return Err(DbError::Window(format!(
                    "window `{}` is declared twice",
                    def.name
                )));
            }
        }

        let mut tables: Vec<TableRef> = source.into_iter().collect();
        tables.extend(joins.iter().map(|j| j.table.clone()));

        self.scoped(tables, |v| {
            let named = data.windows.as_slice();

            for column in &data.columns {
                v.expr(column, Ctx::grouped("the projection", named, true))?;
            }
            for join in &joins {
                if let Some(on) = &join.on {
                    v.expr(on, Ctx::plain("JOIN ON"))?;
                }
            }
            if let Some(filter) = &data.filter {
                v.expr(filter, Ctx::plain("WHERE"))?;
            }
            for expr in &data.group_by {
                v.expr(expr, Ctx::plain("GROUP BY"))?;
            }
            if let Some(having) = &data.having {
                v.expr(having, Ctx::grouped("HAVING", named, false))?;
            }
            for def in &data.windows {
                v.window(&def.window, named)?;
            }
            v.order_terms(&data.order_by, Ctx::grouped("ORDER BY", named, true))
        })
    }

    fn order_terms(&mut self, terms: &[OrderTerm], ctx: Ctx<'_>) -> Result<()> {
        for term in terms {
            self.expr(&term.expr, ctx)?;
        }
        Ok(())
    }

    fn window(&mut self, window: &Window, named: &[WindowDef]) -> Result<()> {
        for expr in &window.partition_by {
            self.expr(expr, Ctx::grouped("PARTITION BY", named, false))?;
        }
        self.order_terms(&window.order_by, Ctx::grouped("a window ORDER BY", named, false))?;
        if let Some(frame) = &window.frame {
            frame.validate()?;
        }
        Ok(())
    }

    fn compound(&mut self, compound: &Compound) -> Result<()> {
        let data = compound.data();

        let mut left = &data.left;
        while let Query::Compound(inner) = left {
            let inner = inner.data();
            if !inner.order_by.is_empty() || inner.limit.is_some() || inner.offset.is_some() {
                return Err(DbError::Construction(
                    "ORDER BY and LIMIT apply to the whole compound, not to an operand".into(),
                ));
            }
            left = &inner.left;
        }

        let operands = compound.operands();
        let arity = compound.arity();
        for operand in &operands {
            let op = operand.data();
            if !op.order_by.is_empty() || op.limit.is_some() || op.offset.is_some() {
                return Err(DbError::Construction(
                    "a compound operand cannot carry its own ORDER BY or LIMIT".into(),
                ));
            }
            if operand.arity() != arity {
                return Err(DbError::Arity(format!(
                    "compound operands project {} and {} columns",
                    arity,
                    operand.arity()
                )));
            }
            self.select(operand)?;
        }

        let names = compound.output_names();
        for term in &data.order_by {
            let name = term.expr.output_name().ok_or_else(|| {
                DbError::Construction("compound ORDER BY terms must name an output column".into())
            })?;
            if !names.iter().flatten().any(|n| n == name) {
                return Err(DbError::Construction(format!(
                    "`{name}` is not an output column of the compound"
                )));
            }
        }
        Ok(())
    }

    fn insert(&mut self, insert: &Insert) -> Result<()> {
        let data = insert.data();
        if data.mixed {
            return Err(DbError::Construction(
                "`set` cannot be combined with whole rows, and inserted columns must be plain columns"
                    .into(),
            ));
        }
        let schema = data.table.schema().filter(|_| !data.table.is_excluded()).ok_or_else(|| {
            DbError::Construction(format!(
                "cannot insert into `{}`",
                data.table.visible_name()
            ))
        })?;
        schema.validate()?;

        for column in &data.columns {
            if !schema.has_column(column) {
                return Err(DbError::unknown_column(schema.name(), column));
            }
        }
        let width = if data.columns.is_empty() {
            schema.columns().len()
        } else {
            data.columns.len()
        };

        match &data.source {
            InsertSource::Values(rows) => {
                for (idx, row) in rows.iter().enumerate() {
                    if row.len() != width {
                        return Err(DbError::Arity(format!(
                            "row {} has {} values, `{}` expects {width}",
                            idx + 1,
                            row.len(),
                            schema.name()
                        )));
                    }
                    for value in row {
                        self.expr(value, Ctx::plain("VALUES"))?;
                    }
                }
            }
            InsertSource::Query(query) => {
                self.query(query)?;
                if query.arity() != width {
                    return Err(DbError::Arity(format!(
                        "the query projects {} columns, `{}` expects {width}",
                        query.arity(),
                        schema.name()
                    )));
                }
            }
        }

        let Some(upsert) = &data.upsert else {
            return Ok(());
        };
        for target in &upsert.target {
            let column = target
                .as_column()
                .filter(|c| !c.table.is_excluded() && c.table.table_name() == schema.name())
                .ok_or_else(|| {
                    DbError::Construction(format!(
                        "conflict targets must be columns of `{}`",
                        schema.name()
                    ))
                })?;
            if !schema.has_column(&column.name) {
                return Err(DbError::unknown_column(schema.name(), &column.name));
            }
        }

        if let UpsertAction::Update {
            assignments,
            filter,
        } = &upsert.action
        {
            if upsert.target.is_empty() {
                return Err(DbError::Construction(
                    "DO UPDATE needs a conflict target".into(),
                ));
            }
            let ctx = Ctx {
                excluded: true,
                ..Ctx::plain("DO UPDATE")
            };
            self.scoped(vec![data.table.clone()], |v| {
                v.assignments(&data.table, assignments, ctx)?;
                match filter {
                    Some(filter) => v.expr(filter, ctx),
                    None => Ok(()),
                }
            })?;
        }
        Ok(())
    }

    fn assignments(&mut self, table: &TableRef, assignments: &[Assignment], ctx: Ctx<'_>) -> Result<()> {
        for assignment in assignments {
            let column = assignment
                .column
                .as_column()
                .filter(|c| !c.table.is_excluded() && c.table.table_name() == table.table_name())
                .ok_or_else(|| {
                    DbError::Construction(format!(
                        "assignment targets must be columns of `{}`",
                        table.table_name()
                    ))
                })?;
            if !table.has_column(&column.name) {
                return Err(DbError::unknown_column(table.table_name(), &column.name));
            }
            self.expr(&assignment.value, ctx)?;
        }
        Ok(())
    }

    fn update(&mut self, update: &Update) -> Result<()> {
        let data = update.data();
        if data.assignments.is_empty() {
            return Err(DbError::Construction("UPDATE needs at least one assignment".into()));
        }
        self.declared(&data.table)?;
        self.scoped(vec![data.table.clone()], |v| {
            v.assignments(&data.table, &data.assignments, Ctx::plain("UPDATE"))?;
            match &data.filter {
                Some(filter) => v.expr(filter, Ctx::plain("WHERE")),
                None => Ok(()),
            }
        })
    }

    fn delete(&mut self, delete: &Delete) -> Result<()> {
        let data = delete.data();
        self.declared(&data.table)?;
        self.scoped(vec![data.table.clone()], |v| match &data.filter {
            Some(filter) => v.expr(filter, Ctx::plain("DELETE")),
            None => Ok(()),
        })
    }

    fn create_table(&mut self, create: &CreateTable) -> Result<()> {
        let schema = create.table.schema().ok_or_else(|| {
            DbError::Construction("CREATE TABLE needs a declared table".into())
        })?;
        schema.validate()?;
        for check in schema.checks() {
            let mut nested = false;
            check.expr.visit(&mut |node| {
                nested |= matches!(
                    node.node(),
                    ExprNode::Subquery(_) | ExprNode::Exists(_) | ExprNode::InQuery { .. }
                );
            });
            if nested {
                return Err(DbError::Construction(format!(
                    "check `{}` cannot contain a subquery",
                    check.name
                )));
            }
            self.expr(&check.expr, Ctx::plain("CHECK"))?;
        }
        Ok(())
    }

    fn column(&self, column: &crate::expr::ColumnRef, ctx: Ctx<'_>) -> Result<()> {
        let table = &column.table;
        match table.source() {
            TableSource::Declaring(_) => return Ok(()),
            TableSource::Excluded(_) if !ctx.excluded => {
                return Err(DbError::Construction(
                    "`excluded` is only valid in the DO UPDATE branch of an upsert".into(),
                ));
            }
            TableSource::Excluded(_) => {}
            TableSource::Table(_) | TableSource::Query(_) => {
                if !self.visible(table) {
                    return Err(DbError::UnknownTable(table.visible_name().to_string()));
                }
            }
        }
        if !table.has_column(&column.name) {
            return Err(DbError::unknown_column(table.visible_name(), &column.name));
        }
        Ok(())
    }

    fn subquery(&mut self, query: &Query) -> Result<()> {
        // correlated subqueries see the enclosing tables
        self.scoped(Vec::new(), |v| v.query(query))
    }

    fn expr(&mut self, expr: &Expr, ctx: Ctx<'_>) -> Result<()> {
        match expr.node() {
            ExprNode::Column(column) => self.column(column, ctx)?,
            ExprNode::Literal(_) | ExprNode::Raw(_) | ExprNode::Star => {}
            ExprNode::Unary { operand, .. } => {
                scalar(operand)?;
                self.expr(operand, ctx)?;
            }
            ExprNode::Binary { op, left, right } => {
                self.expr(left, ctx)?;
                self.expr(right, ctx)?;
                if op.is_comparison() {
                    comparable(left, right)?;
                } else {
                    scalar(left)?;
                    scalar(right)?;
                }
            }
            ExprNode::Between { expr, low, high, .. } => {
                for e in [expr, low, high] {
                    self.expr(e, ctx)?;
                }
                comparable(expr, low)?;
                comparable(expr, high)?;
            }
            ExprNode::InList { expr, list, .. } => {
                self.expr(expr, ctx)?;
                for item in list {
                    self.expr(item, ctx)?;
                    comparable(expr, item)?;
                }
            }
            ExprNode::InQuery { expr, query, .. } => {
                self.expr(expr, ctx)?;
                self.subquery(query)?;
                if width(expr) != query.arity() {
                    return Err(DbError::Arity(format!(
                        "IN compares {} values with a query of {} columns",
                        width(expr),
                        query.arity()
                    )));
                }
            }
            ExprNode::IsNull { expr, .. } => self.expr(expr, ctx)?,
            ExprNode::Exists(query) => self.subquery(query)?,
            ExprNode::Call(call) => {
                self.call_arity(call)?;
                let ctx = match call.role() {
                    FuncRole::Window => {
                        return Err(DbError::Window(format!(
                            "`{}` is a window function and needs OVER",
                            call.name
                        )));
                    }
                    FuncRole::Aggregate => {
                        if !ctx.aggregates {
                            return Err(misuse(call, format!("aggregates are not allowed in {}", ctx.clause)));
                        }
                        if ctx.in_aggregate {
                            return Err(misuse(call, "aggregates cannot be nested".into()));
                        }
                        Ctx {
                            in_aggregate: true,
                            windows: false,
                            ..ctx
                        }
                    }
                    FuncRole::Scalar => ctx,
                };
                for arg in &call.args {
                    self.expr(arg, ctx)?;
                }
            }
            ExprNode::Window { call, over } => {
                if !ctx.windows {
                    return Err(misuse(
                        call,
                        format!(
                            "window functions are only allowed in the projection and ORDER BY, not in {}",
                            ctx.clause
                        ),
                    ));
                }
                if call.role() == FuncRole::Scalar {
                    return Err(DbError::Window(format!(
                        "`{}` cannot be used as a window function",
                        call.name
                    )));
                }
                self.call_arity(call)?;
                let inner = Ctx {
                    windows: false,
                    in_aggregate: false,
                    ..ctx
                };
                for arg in &call.args {
                    self.expr(arg, inner)?;
                }
                match over {
                    Over::Named(name) => {
                        if !ctx.named_windows.iter().any(|d| &d.name == name) {
                            return Err(DbError::Window(format!("window `{name}` is not declared")));
                        }
                    }
                    Over::Inline(window) => self.window(window, ctx.named_windows)?,
                }
            }
            ExprNode::Alias { expr, .. } => self.expr(expr, ctx)?,
            ExprNode::Subquery(query) => {
                self.subquery(query)?;
                if query.arity() != 1 {
                    return Err(DbError::Arity(format!(
                        "a scalar subquery must return one column, not {}",
                        query.arity()
                    )));
                }
            }
            ExprNode::Tuple(items) => {
                if items.is_empty() {
                    return Err(DbError::Arity("a row value needs at least one item".into()));
                }
                for item in items {
                    self.expr(item, ctx)?;
                }
            }
            ExprNode::Invalid(reason) => return Err(DbError::Construction(reason.clone())),
        }
        Ok(())
    }

    fn call_arity(&self, call: &Call) -> Result<()> {
        match call.decl {
            Some(decl) if !decl.accepts(call.args.len()) => Err(DbError::Arity(format!(
                "{} does not take {} arguments",
                decl.name,
                call.args.len()
            ))),
            _ => Ok(()),
        }
    }
}

fn misuse(call: &Call, reason: String) -> DbError {
    DbError::AggregateMisuse {
        function: call.name.clone(),
        reason,
    }
}

/// Number of values an expression stands for.
fn width(expr: &Expr) -> usize {
    match expr.unaliased().node() {
        ExprNode::Tuple(items) => items.len(),
        ExprNode::Subquery(query) => query.arity(),
        _ => 1,
    }
}

fn scalar(expr: &Expr) -> Result<()> {
    match width(expr) {
        1 => Ok(()),
        n => Err(DbError::Arity(format!(
            "expected a single value, found a row of {n}"
        ))),
    }
}

fn domain(expr: &Expr) -> Option<Domain> {
    match expr.unaliased().node() {
        ExprNode::Column(column) => column.domain(),
        ExprNode::Literal(Value::Blob(_)) => Some(Domain::Blob),
        ExprNode::Literal(Value::Text(_)) => Some(Domain::Text),
        ExprNode::Literal(Value::Integer(_)) => Some(Domain::Integer),
        ExprNode::Literal(Value::Real(_)) => Some(Domain::Real),
        _ => None,
    }
}

/// Both sides must have the same width, and BLOBs only compare with BLOBs.
fn comparable(left: &Expr, right: &Expr) -> Result<()> {
    let (lw, rw) = (width(left), width(right));
    if lw != rw {
        return Err(DbError::Arity(format!(
            "cannot compare a row of {lw} with a row of {rw}"
        )));
    }
    if let (ExprNode::Tuple(ls), ExprNode::Tuple(rs)) =
        (left.unaliased().node(), right.unaliased().node())
    {
        for (l, r) in ls.iter().zip(rs) {
            comparable(l, r)?;
        }
        return Ok(());
    }
    match (domain(left), domain(right)) {
        (Some(l), Some(r))
            if l != r
                && (l == Domain::Blob || r == Domain::Blob)
                && l != Domain::Any
                && r != Domain::Any =>
        {
            Err(DbError::TypeMismatch(format!(
                "cannot compare {l:?} with {r:?}"
            )))
        }
        _ => Ok(()),
    }
}
