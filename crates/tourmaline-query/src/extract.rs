//! Structural extraction of table/column references from SQL.
//!
//! The traversal is exhaustive over the AST forms it supports and rejects
//! everything else. Wildcards are expanded against the schema catalog at
//! extraction time, so the evaluator only ever sees concrete columns.

use sqlparser::ast::{
    Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, Ident, JoinConstraint,
    JoinOperator, ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tourmaline_types::{ColumnName, SchemaCatalog, TableName};
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::reference::QueryReference;

/// Maximum combined query/expression nesting the traversal will follow.
const MAX_NESTING: usize = 32;

/// Extracts the full reference set of a single SQL statement.
///
/// Fails closed: any parse error, unsupported construct, or unresolvable
/// name is an error; a partial reference set is never returned.
pub fn extract_references(sql: &str, catalog: &dyn SchemaCatalog) -> Result<QueryReference> {
    let dialect = GenericDialect {};
    let statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| ExtractError::Parse(e.to_string()))?;

    if statements.len() != 1 {
        return Err(ExtractError::StatementCount(statements.len()));
    }

    let mut refs = QueryReference::new();

    match &statements[0] {
        Statement::Query(query) => {
            collect_query(query, catalog, None, &mut refs, 0)?;
        }
        Statement::Insert(insert) => {
            collect_insert(insert, catalog, &mut refs)?;
        }
        Statement::Update {
            table,
            assignments,
            selection,
            returning,
            ..
        } => {
            collect_update(
                table,
                assignments,
                selection.as_ref(),
                returning.as_ref(),
                catalog,
                &mut refs,
            )?;
        }
        Statement::Delete(delete) => {
            collect_delete(delete, catalog, &mut refs)?;
        }
        other => {
            return Err(ExtractError::Unsupported(format!(
                "statement type not supported: {other:?}"
            )));
        }
    }

    debug!(
        tables = ?refs.table_names(),
        columns = ?refs.column_names(),
        "extracted query references"
    );

    Ok(refs)
}

// ============================================================================
// Name scopes
// ============================================================================

/// What a FROM-clause label is bound to.
enum Bound {
    /// A real table, with its catalog column set snapshotted at bind time.
    Table {
        name: TableName,
        columns: Vec<ColumnName>,
    },
    /// A derived table (subquery); its internals are collected separately.
    Derived,
}

/// One label in scope: the table name itself, or its alias.
struct Binding {
    label: String,
    bound: Bound,
}

/// Lexical scope for name resolution, chained outward for correlated
/// subqueries.
struct Scope<'a> {
    bindings: Vec<Binding>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn new(parent: Option<&'a Scope<'a>>) -> Self {
        Self {
            bindings: Vec::new(),
            parent,
        }
    }

    /// Resolves a qualifier (`x` in `x.col`) to its binding, innermost
    /// scope first.
    fn resolve_qualifier(&self, label: &str) -> Option<&Bound> {
        for binding in &self.bindings {
            if binding.label == label {
                return Some(&binding.bound);
            }
        }
        self.parent.and_then(|p| p.resolve_qualifier(label))
    }

    /// Resolves an unqualified column, innermost scope first.
    ///
    /// At each level, the column is attributed to every real table that
    /// contains it (over-reporting is safe; under-reporting is not). If no
    /// real table at the level contains it but the level has derived
    /// bindings, the column is assumed to come from a derived table whose
    /// internals were already collected.
    fn resolve_column(&self, column: &str, refs: &mut QueryReference) -> Result<()> {
        let mut scope = Some(self);
        while let Some(level) = scope {
            let mut matched = false;
            for binding in &level.bindings {
                if let Bound::Table { name, columns } = &binding.bound {
                    if columns.iter().any(|c| c.as_str() == column) {
                        refs.add_column(name.clone(), ColumnName::from(column));
                        matched = true;
                    }
                }
            }
            if matched {
                return Ok(());
            }
            if level
                .bindings
                .iter()
                .any(|b| matches!(b.bound, Bound::Derived))
            {
                return Ok(());
            }
            scope = level.parent;
        }
        Err(ExtractError::UnknownColumn(column.to_string()))
    }

    /// Expands a bare `*` over every real table bound at this level.
    fn expand_wildcard(&self, refs: &mut QueryReference) {
        for binding in &self.bindings {
            if let Bound::Table { name, columns } = &binding.bound {
                for column in columns {
                    refs.add_column(name.clone(), column.clone());
                }
            }
        }
    }
}

// ============================================================================
// Query traversal
// ============================================================================

fn collect_query(
    query: &Query,
    catalog: &dyn SchemaCatalog,
    outer: Option<&Scope<'_>>,
    refs: &mut QueryReference,
    depth: usize,
) -> Result<()> {
    if depth >= MAX_NESTING {
        return Err(ExtractError::NestingTooDeep);
    }

    if query.with.is_some() {
        return Err(ExtractError::Unsupported(
            "WITH clauses (CTEs) are not supported".to_string(),
        ));
    }

    match query.body.as_ref() {
        SetExpr::Select(select) => {
            collect_select(select, query.order_by.as_ref(), catalog, outer, refs, depth)
        }
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_side(left, catalog, outer, refs, depth)?;
            collect_set_side(right, catalog, outer, refs, depth)?;
            // ORDER BY on a set operation refers to output columns of the
            // sides, which were already collected.
            Ok(())
        }
        SetExpr::Query(inner) => collect_query(inner, catalog, outer, refs, depth + 1),
        other => Err(ExtractError::Unsupported(format!(
            "unsupported query body: {other:?}"
        ))),
    }
}

fn collect_set_side(
    side: &SetExpr,
    catalog: &dyn SchemaCatalog,
    outer: Option<&Scope<'_>>,
    refs: &mut QueryReference,
    depth: usize,
) -> Result<()> {
    match side {
        SetExpr::Select(select) => collect_select(select, None, catalog, outer, refs, depth + 1),
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_side(left, catalog, outer, refs, depth + 1)?;
            collect_set_side(right, catalog, outer, refs, depth + 1)
        }
        other => Err(ExtractError::Unsupported(format!(
            "unsupported set operation side: {other:?}"
        ))),
    }
}

fn collect_select(
    select: &Select,
    order_by: Option<&sqlparser::ast::OrderBy>,
    catalog: &dyn SchemaCatalog,
    outer: Option<&Scope<'_>>,
    refs: &mut QueryReference,
    depth: usize,
) -> Result<()> {
    let mut scope = Scope::new(outer);

    // Bind FROM relations and joins before touching any expression.
    for from in &select.from {
        bind_relation(&from.relation, catalog, outer, refs, &mut scope, depth)?;
        for join in &from.joins {
            bind_relation(&join.relation, catalog, outer, refs, &mut scope, depth)?;
        }
    }

    // Join conditions read columns too.
    for from in &select.from {
        for join in &from.joins {
            collect_join_constraint(&join.join_operator, catalog, &scope, refs, depth)?;
        }
    }

    // Projection.
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                collect_expr(expr, catalog, &scope, refs, depth)?;
            }
            SelectItem::Wildcard(_) => {
                scope.expand_wildcard(refs);
            }
            SelectItem::QualifiedWildcard(name, _) => {
                expand_qualified_wildcard(name, &scope, refs)?;
            }
        }
    }

    // WHERE.
    if let Some(selection) = &select.selection {
        collect_expr(selection, catalog, &scope, refs, depth)?;
    }

    // GROUP BY.
    match &select.group_by {
        sqlparser::ast::GroupByExpr::Expressions(exprs, _) => {
            for expr in exprs {
                collect_expr(expr, catalog, &scope, refs, depth)?;
            }
        }
        sqlparser::ast::GroupByExpr::All(_) => {
            return Err(ExtractError::Unsupported(
                "GROUP BY ALL is not supported".to_string(),
            ));
        }
    }

    // HAVING.
    if let Some(having) = &select.having {
        collect_expr(having, catalog, &scope, refs, depth)?;
    }

    // ORDER BY: bare identifiers may name projection aliases, which are
    // not table reads of their own.
    if let Some(order_by) = order_by {
        let aliases = projection_aliases(select);
        for order_expr in &order_by.exprs {
            if let Expr::Identifier(ident) = &order_expr.expr {
                if aliases.iter().any(|a| a == &ident.value) {
                    continue;
                }
            }
            collect_expr(&order_expr.expr, catalog, &scope, refs, depth)?;
        }
    }

    Ok(())
}

fn projection_aliases(select: &Select) -> Vec<String> {
    select
        .projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::ExprWithAlias { alias, .. } => Some(alias.value.clone()),
            _ => None,
        })
        .collect()
}

fn bind_relation(
    relation: &TableFactor,
    catalog: &dyn SchemaCatalog,
    outer: Option<&Scope<'_>>,
    refs: &mut QueryReference,
    scope: &mut Scope<'_>,
    depth: usize,
) -> Result<()> {
    match relation {
        TableFactor::Table { name, alias, .. } => {
            let table = TableName::from(object_name_to_string(name));
            let columns = catalog
                .columns(&table)
                .ok_or_else(|| ExtractError::UnknownTable(table.clone()))?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let label = alias
                .as_ref()
                .map_or_else(|| table.to_string(), |a| a.name.value.clone());
            refs.add_table(table.clone());
            scope.bindings.push(Binding {
                label,
                bound: Bound::Table {
                    name: table,
                    columns,
                },
            });
            Ok(())
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            collect_query(subquery, catalog, outer, refs, depth + 1)?;
            let label = alias
                .as_ref()
                .map(|a| a.name.value.clone())
                .unwrap_or_default();
            scope.bindings.push(Binding {
                label,
                bound: Bound::Derived,
            });
            Ok(())
        }
        other => Err(ExtractError::Unsupported(format!(
            "unsupported FROM relation: {other:?}"
        ))),
    }
}

fn collect_join_constraint(
    operator: &JoinOperator,
    catalog: &dyn SchemaCatalog,
    scope: &Scope<'_>,
    refs: &mut QueryReference,
    depth: usize,
) -> Result<()> {
    let constraint = match operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => c,
        JoinOperator::CrossJoin => return Ok(()),
        other => {
            return Err(ExtractError::Unsupported(format!(
                "join type not supported: {other:?}"
            )));
        }
    };

    match constraint {
        JoinConstraint::On(expr) => collect_expr(expr, catalog, scope, refs, depth),
        JoinConstraint::Using(idents) => {
            for ident in idents {
                scope.resolve_column(&ident.value, refs)?;
            }
            Ok(())
        }
        JoinConstraint::None => Ok(()),
        JoinConstraint::Natural => Err(ExtractError::Unsupported(
            "NATURAL joins are not supported".to_string(),
        )),
    }
}

fn expand_qualified_wildcard(
    name: &ObjectName,
    scope: &Scope<'_>,
    refs: &mut QueryReference,
) -> Result<()> {
    let qualifier = object_name_to_string(name);
    match scope.resolve_qualifier(&qualifier) {
        Some(Bound::Table { name, columns }) => {
            for column in columns {
                refs.add_column(name.clone(), column.clone());
            }
            Ok(())
        }
        // Derived-table internals were collected when the subquery was
        // traversed.
        Some(Bound::Derived) => Ok(()),
        None => Err(ExtractError::UnknownAlias(qualifier)),
    }
}

// ============================================================================
// Expression traversal
// ============================================================================

fn collect_expr(
    expr: &Expr,
    catalog: &dyn SchemaCatalog,
    scope: &Scope<'_>,
    refs: &mut QueryReference,
    depth: usize,
) -> Result<()> {
    if depth >= MAX_NESTING {
        return Err(ExtractError::NestingTooDeep);
    }

    match expr {
        Expr::Identifier(ident) => scope.resolve_column(&ident.value, refs),

        Expr::CompoundIdentifier(parts) => collect_compound(parts, scope, refs),

        Expr::BinaryOp { left, right, .. } => {
            collect_expr(left, catalog, scope, refs, depth + 1)?;
            collect_expr(right, catalog, scope, refs, depth + 1)
        }

        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::Cast { expr, .. }
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr) => collect_expr(expr, catalog, scope, refs, depth + 1),

        Expr::Between {
            expr, low, high, ..
        } => {
            collect_expr(expr, catalog, scope, refs, depth + 1)?;
            collect_expr(low, catalog, scope, refs, depth + 1)?;
            collect_expr(high, catalog, scope, refs, depth + 1)
        }

        Expr::InList { expr, list, .. } => {
            collect_expr(expr, catalog, scope, refs, depth + 1)?;
            for item in list {
                collect_expr(item, catalog, scope, refs, depth + 1)?;
            }
            Ok(())
        }

        Expr::InSubquery { expr, subquery, .. } => {
            collect_expr(expr, catalog, scope, refs, depth + 1)?;
            collect_query(subquery, catalog, Some(scope), refs, depth + 1)
        }

        Expr::Exists { subquery, .. } => {
            collect_query(subquery, catalog, Some(scope), refs, depth + 1)
        }

        Expr::Subquery(subquery) => collect_query(subquery, catalog, Some(scope), refs, depth + 1),

        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            collect_expr(expr, catalog, scope, refs, depth + 1)?;
            collect_expr(pattern, catalog, scope, refs, depth + 1)
        }

        Expr::Tuple(exprs) => {
            for item in exprs {
                collect_expr(item, catalog, scope, refs, depth + 1)?;
            }
            Ok(())
        }

        Expr::Function(func) => collect_function(func, catalog, scope, refs, depth),

        Expr::Value(_) => Ok(()),

        other => Err(ExtractError::Unsupported(format!(
            "unsupported expression: {other:?}"
        ))),
    }
}

fn collect_compound(
    parts: &[Ident],
    scope: &Scope<'_>,
    refs: &mut QueryReference,
) -> Result<()> {
    if parts.len() != 2 {
        return Err(ExtractError::Unsupported(format!(
            "multi-part identifier not supported: {}",
            parts
                .iter()
                .map(|p| p.value.as_str())
                .collect::<Vec<_>>()
                .join(".")
        )));
    }

    let qualifier = &parts[0].value;
    let column = &parts[1].value;

    match scope.resolve_qualifier(qualifier) {
        Some(Bound::Table { name, .. }) => {
            refs.add_column(name.clone(), ColumnName::from(column.as_str()));
            Ok(())
        }
        Some(Bound::Derived) => Ok(()),
        None => Err(ExtractError::UnknownAlias(qualifier.clone())),
    }
}

fn collect_function(
    func: &sqlparser::ast::Function,
    catalog: &dyn SchemaCatalog,
    scope: &Scope<'_>,
    refs: &mut QueryReference,
    depth: usize,
) -> Result<()> {
    if func.over.is_some() {
        return Err(ExtractError::Unsupported(
            "window functions are not supported".to_string(),
        ));
    }

    match &func.args {
        FunctionArguments::None => Ok(()),
        FunctionArguments::Subquery(subquery) => {
            collect_query(subquery, catalog, Some(scope), refs, depth + 1)
        }
        FunctionArguments::List(list) => {
            for arg in &list.args {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => {
                        collect_expr(expr, catalog, scope, refs, depth + 1)?;
                    }
                    // COUNT(*) still reveals how many rows match, so the
                    // wildcard expands like any other.
                    FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => {
                        scope.expand_wildcard(refs);
                    }
                    FunctionArg::Unnamed(FunctionArgExpr::QualifiedWildcard(name)) => {
                        expand_qualified_wildcard(name, scope, refs)?;
                    }
                    other => {
                        return Err(ExtractError::Unsupported(format!(
                            "unsupported function argument: {other:?}"
                        )));
                    }
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// DML classification
// ============================================================================

fn collect_insert(
    insert: &sqlparser::ast::Insert,
    catalog: &dyn SchemaCatalog,
    refs: &mut QueryReference,
) -> Result<()> {
    let table = TableName::from(insert.table.to_string());
    let columns: Vec<ColumnName> = catalog
        .columns(&table)
        .ok_or_else(|| ExtractError::UnknownTable(table.clone()))?
        .into_iter()
        .map(|c| c.name)
        .collect();

    refs.add_table(table.clone());
    for ident in &insert.columns {
        refs.add_column(table.clone(), ColumnName::from(ident.value.as_str()));
    }

    let mut scope = Scope::new(None);
    scope.bindings.push(Binding {
        label: table.to_string(),
        bound: Bound::Table {
            name: table.clone(),
            columns,
        },
    });

    if let Some(source) = &insert.source {
        match source.body.as_ref() {
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for expr in row {
                        collect_expr(expr, catalog, &scope, refs, 0)?;
                    }
                }
            }
            _ => collect_query(source, catalog, None, refs, 0)?,
        }
    }

    collect_returning(insert.returning.as_ref(), &scope, refs)
}

fn collect_update(
    table: &TableWithJoins,
    assignments: &[sqlparser::ast::Assignment],
    selection: Option<&Expr>,
    returning: Option<&Vec<SelectItem>>,
    catalog: &dyn SchemaCatalog,
    refs: &mut QueryReference,
) -> Result<()> {
    let mut scope = Scope::new(None);
    bind_relation(&table.relation, catalog, None, refs, &mut scope, 0)?;
    for join in &table.joins {
        bind_relation(&join.relation, catalog, None, refs, &mut scope, 0)?;
    }
    for join in &table.joins {
        collect_join_constraint(&join.join_operator, catalog, &scope, refs, 0)?;
    }

    let target_table = match &table.relation {
        TableFactor::Table { name, .. } => TableName::from(object_name_to_string(name)),
        other => {
            return Err(ExtractError::Unsupported(format!(
                "unsupported UPDATE target: {other:?}"
            )));
        }
    };

    for assignment in assignments {
        let target = assignment.target.to_string();
        let column = target.rsplit('.').next().unwrap_or(&target);
        refs.add_column(target_table.clone(), ColumnName::from(column));
        collect_expr(&assignment.value, catalog, &scope, refs, 0)?;
    }

    if let Some(selection) = selection {
        collect_expr(selection, catalog, &scope, refs, 0)?;
    }

    collect_returning(returning, &scope, refs)
}

fn collect_delete(
    delete: &sqlparser::ast::Delete,
    catalog: &dyn SchemaCatalog,
    refs: &mut QueryReference,
) -> Result<()> {
    let tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };

    if tables.len() != 1 {
        return Err(ExtractError::Unsupported(
            "DELETE over multiple tables is not supported".to_string(),
        ));
    }

    let mut scope = Scope::new(None);
    bind_relation(&tables[0].relation, catalog, None, refs, &mut scope, 0)?;

    if let Some(selection) = &delete.selection {
        collect_expr(selection, catalog, &scope, refs, 0)?;
    }

    collect_returning(delete.returning.as_ref(), &scope, refs)
}

fn collect_returning(
    returning: Option<&Vec<SelectItem>>,
    scope: &Scope<'_>,
    refs: &mut QueryReference,
) -> Result<()> {
    let Some(items) = returning else {
        return Ok(());
    };

    for item in items {
        match item {
            SelectItem::UnnamedExpr(Expr::Identifier(ident))
            | SelectItem::ExprWithAlias {
                expr: Expr::Identifier(ident),
                ..
            } => {
                scope.resolve_column(&ident.value, refs)?;
            }
            SelectItem::Wildcard(_) => scope.expand_wildcard(refs),
            other => {
                return Err(ExtractError::Unsupported(format!(
                    "unsupported RETURNING item: {other:?}"
                )));
            }
        }
    }

    Ok(())
}

fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|i: &Ident| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;
    use tourmaline_types::{CatalogBuilder, ColumnInfo, DataType, MemoryCatalog};

    fn catalog() -> MemoryCatalog {
        CatalogBuilder::new()
            .table(
                "employees",
                vec![
                    ColumnInfo::new("id", DataType::BigInt),
                    ColumnInfo::new("name", DataType::Text).public(),
                    ColumnInfo::new("email", DataType::Text),
                    ColumnInfo::new("salary", DataType::BigInt),
                    ColumnInfo::new("ssn", DataType::Text),
                    ColumnInfo::new("dept_id", DataType::BigInt),
                ],
            )
            .table(
                "departments",
                vec![
                    ColumnInfo::new("id", DataType::BigInt),
                    ColumnInfo::new("dept_name", DataType::Text).public(),
                    ColumnInfo::new("budget", DataType::BigInt),
                ],
            )
            .build()
    }

    fn pairs(refs: &QueryReference) -> Vec<String> {
        refs.column_names()
    }

    #[test]
    fn test_simple_select() {
        let refs = extract_references("SELECT name, salary FROM employees", &catalog())
            .expect("extraction must succeed");
        assert_eq!(pairs(&refs), vec!["employees.name", "employees.salary"]);
    }

    #[test]
    fn test_wildcard_expansion() {
        let refs =
            extract_references("SELECT * FROM employees", &catalog()).expect("must succeed");
        // All six catalog columns, never zero.
        assert_eq!(refs.columns_of(&"employees".into()).len(), 6);
        assert!(pairs(&refs).contains(&"employees.ssn".to_string()));
    }

    #[test]
    fn test_qualified_wildcard() {
        let refs = extract_references(
            "SELECT e.* FROM employees e JOIN departments d ON e.dept_id = d.id",
            &catalog(),
        )
        .expect("must succeed");

        assert_eq!(refs.columns_of(&"employees".into()).len(), 6);
        // Only the join condition touches departments.
        assert_eq!(pairs(&refs).iter().filter(|p| p.starts_with("departments")).count(), 1);
    }

    #[test]
    fn test_join_references_both_tables() {
        let refs = extract_references(
            "SELECT e.name, d.dept_name FROM employees e \
             INNER JOIN departments d ON e.dept_id = d.id",
            &catalog(),
        )
        .expect("must succeed");

        assert_eq!(
            pairs(&refs),
            vec![
                "departments.dept_name",
                "departments.id",
                "employees.dept_id",
                "employees.name",
            ]
        );
    }

    #[test]
    fn test_where_counts_as_read() {
        let refs = extract_references(
            "SELECT name FROM employees WHERE salary > 100000",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"employees.salary".to_string()));
    }

    #[test]
    fn test_subquery_in_where() {
        let refs = extract_references(
            "SELECT name FROM employees WHERE dept_id IN \
             (SELECT id FROM departments WHERE budget > 0)",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"departments.id".to_string()));
        assert!(pairs(&refs).contains(&"departments.budget".to_string()));
    }

    #[test]
    fn test_correlated_subquery() {
        let refs = extract_references(
            "SELECT name FROM employees e WHERE EXISTS \
             (SELECT id FROM departments d WHERE d.id = e.dept_id)",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"employees.dept_id".to_string()));
    }

    #[test]
    fn test_derived_table() {
        let refs = extract_references(
            "SELECT t.name FROM (SELECT name, salary FROM employees) t",
            &catalog(),
        )
        .expect("must succeed");

        // The inner select's reads are what matter.
        assert!(pairs(&refs).contains(&"employees.name".to_string()));
        assert!(pairs(&refs).contains(&"employees.salary".to_string()));
    }

    #[test]
    fn test_union() {
        let refs = extract_references(
            "SELECT name FROM employees UNION SELECT dept_name FROM departments",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"employees.name".to_string()));
        assert!(pairs(&refs).contains(&"departments.dept_name".to_string()));
    }

    #[test]
    fn test_count_star_expands() {
        let refs = extract_references("SELECT COUNT(*) FROM employees", &catalog())
            .expect("must succeed");
        // A wildcard is never treated as "no columns".
        assert_eq!(refs.columns_of(&"employees".into()).len(), 6);
    }

    #[test]
    fn test_group_by_and_having() {
        let refs = extract_references(
            "SELECT dept_id, COUNT(id) FROM employees GROUP BY dept_id HAVING COUNT(id) > 3",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"employees.dept_id".to_string()));
        assert!(pairs(&refs).contains(&"employees.id".to_string()));
    }

    #[test]
    fn test_order_by_alias_is_not_a_read() {
        let refs = extract_references(
            "SELECT salary AS pay FROM employees ORDER BY pay",
            &catalog(),
        )
        .expect("must succeed");

        assert_eq!(pairs(&refs), vec!["employees.salary"]);
    }

    #[test]
    fn test_insert_classification() {
        let refs = extract_references(
            "INSERT INTO employees (name, email) VALUES ('a', 'b')",
            &catalog(),
        )
        .expect("must succeed");

        assert_eq!(pairs(&refs), vec!["employees.email", "employees.name"]);
    }

    #[test]
    fn test_update_classification() {
        let refs = extract_references(
            "UPDATE employees SET salary = 1 WHERE ssn = 'x'",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"employees.salary".to_string()));
        assert!(pairs(&refs).contains(&"employees.ssn".to_string()));
    }

    #[test]
    fn test_delete_classification() {
        let refs =
            extract_references("DELETE FROM employees WHERE id = 1", &catalog())
                .expect("must succeed");

        assert_eq!(pairs(&refs), vec!["employees.id"]);
    }

    #[test_case("SELECT name FROM unknown_table"; "unknown table")]
    #[test_case("SELECT * FROM unknown_table"; "wildcard over unknown table")]
    #[test_case("SELECT x.name FROM employees"; "unknown alias")]
    #[test_case("SELECT nonexistent FROM employees"; "unknown column")]
    #[test_case("WITH t AS (SELECT 1) SELECT * FROM t"; "cte")]
    #[test_case("SELECT name FROM employees; SELECT 1"; "multiple statements")]
    #[test_case("SELECT name FROM employees NATURAL JOIN departments"; "natural join")]
    fn test_fails_closed(sql: &str) {
        assert!(extract_references(sql, &catalog()).is_err());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = extract_references("NOT EVEN SQL !!", &catalog()).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn test_ambiguous_unqualified_column_over_reports() {
        // `id` exists in both tables; attributing it to both over-reports,
        // which is the safe direction.
        let refs = extract_references(
            "SELECT id FROM employees e JOIN departments d ON e.dept_id = d.id",
            &catalog(),
        )
        .expect("must succeed");

        assert!(pairs(&refs).contains(&"employees.id".to_string()));
        assert!(pairs(&refs).contains(&"departments.id".to_string()));
    }

    proptest! {
        /// Extraction never panics, whatever the input.
        #[test]
        fn prop_no_panic(sql in ".{0,120}") {
            let _ = extract_references(&sql, &catalog());
        }

        /// The wildcard reference set contains every single-column set:
        /// `SELECT *` can never reveal less than `SELECT col`.
        #[test]
        fn prop_wildcard_superset(col in prop::sample::select(vec![
            "id", "name", "email", "salary", "ssn", "dept_id",
        ])) {
            let catalog = catalog();
            let star = extract_references("SELECT * FROM employees", &catalog).unwrap();
            let single = extract_references(
                &format!("SELECT {col} FROM employees"),
                &catalog,
            ).unwrap();

            for (table, column) in single.pairs() {
                prop_assert!(star.columns_of(table).contains(&column));
            }
        }
    }
}
