use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::types::{
    number_format, CompileError, CompiledGroup, CompiledRule, DependencyGraph, Field, FieldId,
    FieldKind, Form, FormDefinition, Formula, Rule, TargetId, TargetNode,
};

/// One target in form order, before ranking.
struct Placement {
    target: TargetId,
    owner: FieldId,
    container: Option<TargetId>,
}

pub(crate) fn compile(definition: FormDefinition) -> Result<Form, CompileError> {
    let positions = check_duplicates(&definition.fields)?;
    check_products(&definition.fields, &positions)?;
    let formulas = compile_formulas(&definition.fields, &positions)?;

    let placements = layout(&definition.fields);
    let slots: BTreeMap<TargetId, usize> = placements
        .iter()
        .enumerate()
        .map(|(i, p)| (p.target, i))
        .collect();

    let mut groups: Vec<Option<CompiledGroup>> = placements
        .iter()
        .map(|p| compile_group(p, &definition, &positions))
        .collect();

    let sorted = loop {
        let edges = collect_edges(&placements, &groups, &slots);
        let Some(sorted) = topological_sort(&placements, &edges) else {
            let cycle = find_cycle(&edges);
            if !break_cycle(&placements, &mut groups, &cycle) {
                return Err(CompileError::CyclicDependency {
                    path: cycle.iter().map(|&s| placements[s].target.to_string()).collect(),
                });
            }
            continue;
        };
        break sorted;
    };

    let mut rank = vec![0; placements.len()];
    for (r, &slot) in sorted.iter().enumerate() {
        rank[slot] = r;
    }

    let mut nodes: BTreeMap<TargetId, TargetNode> = BTreeMap::new();
    for (slot, (placement, group)) in placements.iter().zip(groups).enumerate() {
        nodes.insert(
            placement.target,
            TargetNode {
                rank: rank[slot],
                group,
                container: placement.container,
                members: Vec::new(),
            },
        );
    }

    let order: Vec<TargetId> = sorted.iter().map(|&slot| placements[slot].target).collect();

    // Walking in rank order keeps member and dependent lists rank-sorted.
    let mut dependents: BTreeMap<FieldId, Vec<TargetId>> = BTreeMap::new();
    for &target in &order {
        let container = nodes.get(&target).and_then(|n| n.container);
        if let Some(parent) = container.and_then(|c| nodes.get_mut(&c)) {
            parent.members.push(target);
        }
        let triggers = nodes
            .get(&target)
            .and_then(|n| n.group.as_ref())
            .map(trigger_fields)
            .unwrap_or_default();
        for trigger in triggers {
            dependents.entry(trigger).or_default().push(target);
        }
    }

    let defaults = definition
        .fields
        .iter()
        .filter_map(|f| f.default_state().map(|s| (f.id, s)))
        .collect();

    debug!(
        form = definition.id,
        fields = definition.fields.len(),
        targets = order.len(),
        "compiled form"
    );

    Ok(Form {
        definition,
        positions,
        defaults,
        formulas,
        graph: DependencyGraph {
            order,
            nodes,
            dependents,
        },
    })
}

fn check_duplicates(fields: &[Field]) -> Result<BTreeMap<FieldId, usize>, CompileError> {
    let mut positions = BTreeMap::new();
    for (i, field) in fields.iter().enumerate() {
        if positions.insert(field.id, i).is_some() {
            return Err(CompileError::DuplicateField { id: field.id });
        }
    }
    Ok(positions)
}

fn check_products(
    fields: &[Field],
    positions: &BTreeMap<FieldId, usize>,
) -> Result<(), CompileError> {
    for field in fields {
        if let FieldKind::Quantity { product_id } = field.kind {
            let is_product = positions
                .get(&product_id)
                .is_some_and(|&i| matches!(fields[i].kind, FieldKind::Product { .. }));
            if !is_product {
                return Err(CompileError::UnknownProduct {
                    field: field.id,
                    product: product_id,
                });
            }
        }
    }
    Ok(())
}

fn compile_formulas(
    fields: &[Field],
    positions: &BTreeMap<FieldId, usize>,
) -> Result<BTreeMap<FieldId, Formula>, CompileError> {
    let mut formulas = BTreeMap::new();
    for field in fields {
        if let FieldKind::Calculation { formula, .. } = &field.kind {
            let parsed = Formula::parse(formula).map_err(|e| CompileError::InvalidFormula {
                field: field.id,
                message: e.message().to_owned(),
            })?;
            for operand in parsed.fields() {
                if !positions.contains_key(&operand.field) {
                    warn!(
                        field = field.id,
                        operand = %operand,
                        "formula references an unknown field; it counts as zero"
                    );
                }
            }
            formulas.insert(field.id, parsed);
        }
    }
    Ok(formulas)
}

/// Assign every target its container. A section holds the fields after it
/// until the next section or page break; a page break starts page `n + 1`.
/// Honeypot fields never take part in conditional logic.
fn layout(fields: &[Field]) -> Vec<Placement> {
    let mut placements = Vec::with_capacity(fields.len());
    let mut page_number = 1;
    let mut page: Option<TargetId> = None;
    let mut section: Option<TargetId> = None;

    for field in fields.iter().filter(|f| !f.is_honeypot) {
        match field.kind {
            FieldKind::Page => {
                page_number += 1;
                let target = TargetId::Page(page_number);
                placements.push(Placement {
                    target,
                    owner: field.id,
                    container: None,
                });
                page = Some(target);
                section = None;
            }
            FieldKind::Section => {
                let target = TargetId::Field(field.id);
                placements.push(Placement {
                    target,
                    owner: field.id,
                    container: page,
                });
                section = Some(target);
            }
            _ => placements.push(Placement {
                target: TargetId::Field(field.id),
                owner: field.id,
                container: section.or(page),
            }),
        }
    }
    placements
}

fn compile_group(
    placement: &Placement,
    definition: &FormDefinition,
    positions: &BTreeMap<FieldId, usize>,
) -> Option<CompiledGroup> {
    let owner = &definition.fields[*positions.get(&placement.owner)?];
    let group = owner.rule_group()?;
    let rules = group
        .rules
        .iter()
        .map(|rule| compile_rule(rule, placement.target, definition, positions))
        .collect();
    Some(CompiledGroup {
        action_type: group.action_type,
        logic_type: group.logic_type,
        rules,
    })
}

fn compile_rule(
    rule: &Rule,
    target: TargetId,
    definition: &FormDefinition,
    positions: &BTreeMap<FieldId, usize>,
) -> CompiledRule {
    let Some(trigger) = positions
        .get(&rule.field_id.field)
        .map(|&i| &definition.fields[i])
    else {
        warn!(
            %target,
            field = %rule.field_id,
            "rule references an unknown field and can never match"
        );
        return CompiledRule::unsatisfiable(rule);
    };
    if let Some(sub) = rule.field_id.input {
        if !trigger.input_ids().contains(&sub) {
            warn!(
                %target,
                field = %rule.field_id,
                "rule references an unknown sub-input and can never match"
            );
            return CompiledRule::unsatisfiable(rule);
        }
    }
    let format = number_format(trigger, &definition.currency);
    match trigger.kind {
        FieldKind::Number { .. } | FieldKind::Total => {
            CompiledRule::for_number_field(rule, &format)
        }
        _ => CompiledRule::new(rule, &format),
    }
}

fn trigger_fields(group: &CompiledGroup) -> Vec<FieldId> {
    let mut out: Vec<FieldId> = Vec::new();
    for rule in group.rules.iter().filter(|r| r.satisfiable) {
        if !out.contains(&rule.field.field) {
            out.push(rule.field.field);
        }
    }
    out
}

/// `edges[slot]` lists the slots that must be decided before `slot`: its
/// container and every trigger field that is itself a target.
fn collect_edges(
    placements: &[Placement],
    groups: &[Option<CompiledGroup>],
    slots: &BTreeMap<TargetId, usize>,
) -> Vec<Vec<usize>> {
    placements
        .iter()
        .zip(groups)
        .map(|(placement, group)| {
            let mut deps: Vec<usize> = Vec::new();
            if let Some(&slot) = placement.container.and_then(|c| slots.get(&c)) {
                deps.push(slot);
            }
            for trigger in group.as_ref().map(trigger_fields).unwrap_or_default() {
                if let Some(&slot) = slots.get(&TargetId::Field(trigger)) {
                    if !deps.contains(&slot) {
                        deps.push(slot);
                    }
                }
            }
            deps
        })
        .collect()
}

/// Kahn's algorithm for topological sort. Ties are broken by form order.
/// Returns `None` when the edges contain a cycle.
fn topological_sort(placements: &[Placement], edges: &[Vec<usize>]) -> Option<Vec<usize>> {
    // dependents[x] = slots that depend on x (x must be evaluated before them)
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); placements.len()];
    let mut in_degree: Vec<usize> = vec![0; placements.len()];

    for (slot, deps) in edges.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(slot);
            in_degree[slot] += 1;
        }
    }

    // Slots are form positions, so the smallest ready slot comes first in the form.
    let mut ready: BTreeSet<usize> = (0..placements.len())
        .filter(|&slot| in_degree[slot] == 0)
        .collect();

    let mut sorted = Vec::with_capacity(placements.len());

    while let Some(slot) = ready.pop_first() {
        for &dependent in &dependents[slot] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
        sorted.push(slot);
    }

    (sorted.len() == placements.len()).then_some(sorted)
}

/// Disable the rules that close `cycle`. Container edges always point back
/// in the form, so a cycle holds at least one rule reading its own target
/// or a later one; those rules become unsatisfiable. Returns `false` if
/// nothing could be disabled.
fn break_cycle(
    placements: &[Placement],
    groups: &mut [Option<CompiledGroup>],
    cycle: &[usize],
) -> bool {
    let Some((slot, dep)) = cycle
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .find(|&(slot, dep)| dep >= slot)
    else {
        return false;
    };
    let TargetId::Field(trigger) = placements[dep].target else {
        return false;
    };
    let target = placements[slot].target;
    let Some(group) = groups[slot].as_mut() else {
        return false;
    };
    let mut disabled = false;
    for rule in group.rules.iter_mut() {
        if rule.satisfiable && rule.field.field == trigger {
            rule.satisfiable = false;
            disabled = true;
        }
    }
    if disabled {
        warn!(
            %target,
            trigger,
            "rule closes a dependency cycle and can never match"
        );
    }
    disabled
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}

/// DFS-based cycle finder. The path reads in dependency order: each slot
/// is followed by one it reads from, and the first slot repeats at the end.
fn find_cycle(edges: &[Vec<usize>]) -> Vec<usize> {
    let mut state = vec![DfsState::Unvisited; edges.len()];
    let mut stack: Vec<usize> = Vec::new();

    for slot in 0..edges.len() {
        if state[slot] == DfsState::Unvisited {
            if let Some(cycle) = dfs(slot, edges, &mut state, &mut stack) {
                return cycle;
            }
        }
    }

    // Unreachable when called after the sort found a cycle.
    Vec::new()
}

fn dfs(
    node: usize,
    edges: &[Vec<usize>],
    state: &mut [DfsState],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    state[node] = DfsState::InStack;
    stack.push(node);

    let mut seen = HashSet::new();
    for &neighbor in &edges[node] {
        if !seen.insert(neighbor) {
            continue;
        }
        match state[neighbor] {
            DfsState::InStack => {
                let pos = stack.iter().position(|&n| n == neighbor).unwrap_or(0);
                let mut cycle: Vec<usize> = stack[pos..].to_vec();
                cycle.push(neighbor);
                return Some(cycle);
            }
            DfsState::Unvisited => {
                if let Some(cycle) = dfs(neighbor, edges, state, stack) {
                    return Some(cycle);
                }
            }
            DfsState::Done => {}
        }
    }

    stack.pop();
    state[node] = DfsState::Done;
    None
}

#[cfg(test)]
mod tests {
    use crate::types::{
        field, input, CompileError, Field, FieldKind, Form, FormBuilder, RuleGroup, TargetId,
    };

    #[test]
    fn compile_simple_form() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("a")])))
            .compile()
            .unwrap();
        assert_eq!(
            form.evaluation_order(),
            &[TargetId::Field(1), TargetId::Field(2)]
        );
        assert_eq!(form.dependents_of(1), &[TargetId::Field(2)]);
        assert!(form.dependents_of(2).is_empty());
    }

    #[test]
    fn compile_duplicate_field() {
        let result = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::text(1))
            .compile();
        assert!(matches!(result, Err(CompileError::DuplicateField { id: 1 })));
    }

    fn disabled_triggers(form: &Form, target: TargetId) -> Vec<u32> {
        form.graph()
            .group(target)
            .unwrap()
            .rules()
            .iter()
            .filter(|r| !r.satisfiable)
            .map(|r| r.field().field)
            .collect()
    }

    #[test]
    fn mutual_reference_disables_the_forward_rule() {
        let form = FormBuilder::new()
            .field(Field::text(1).logic(RuleGroup::show_if_all([field(2).is("x")])))
            .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("y")])))
            .compile()
            .unwrap();
        assert_eq!(disabled_triggers(&form, TargetId::Field(1)), vec![2]);
        assert!(disabled_triggers(&form, TargetId::Field(2)).is_empty());
        assert!(form.dependents_of(2).is_empty());
        assert_eq!(form.dependents_of(1), &[TargetId::Field(2)]);
    }

    #[test]
    fn three_node_cycle_loses_one_rule() {
        let form = FormBuilder::new()
            .field(Field::text(1).logic(RuleGroup::show_if_all([field(2).is("x")])))
            .field(Field::text(2).logic(RuleGroup::show_if_all([field(3).is("x")])))
            .field(Field::text(3).logic(RuleGroup::show_if_all([field(1).is("x")])))
            .compile()
            .unwrap();
        let disabled: usize = (1..=3)
            .map(|id| disabled_triggers(&form, TargetId::Field(id)).len())
            .sum();
        assert_eq!(disabled, 1);
        assert_eq!(form.evaluation_order().len(), 3);
    }

    #[test]
    fn self_reference_is_disabled() {
        let form = FormBuilder::new()
            .field(Field::text(1).logic(RuleGroup::hide_if_any([field(1).is("x")])))
            .compile()
            .unwrap();
        assert_eq!(disabled_triggers(&form, TargetId::Field(1)), vec![1]);
        assert!(form.dependents_of(1).is_empty());
    }

    #[test]
    fn section_reading_its_own_member_compiles() {
        let form = FormBuilder::new()
            .field(Field::section(1).logic(RuleGroup::show_if_all([field(3).is("x")])))
            .field(Field::text(2))
            .field(Field::text(3))
            .field(Field::text(4))
            .compile()
            .unwrap();
        assert_eq!(disabled_triggers(&form, TargetId::Field(1)), vec![3]);
        assert_eq!(
            form.graph().members_of(TargetId::Field(1)),
            &[TargetId::Field(2), TargetId::Field(3), TargetId::Field(4)]
        );
    }

    #[test]
    fn cycle_leaves_other_rules_of_the_group_alone() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(
                Field::text(2)
                    .logic(RuleGroup::show_if_any([field(1).is("a"), field(3).is("b")])),
            )
            .field(Field::text(3).logic(RuleGroup::show_if_all([field(2).is("c")])))
            .compile()
            .unwrap();
        assert_eq!(disabled_triggers(&form, TargetId::Field(2)), vec![3]);
        assert_eq!(form.dependents_of(1), &[TargetId::Field(2)]);
    }

    #[test]
    fn section_reading_an_earlier_field_compiles() {
        let form = FormBuilder::new()
            .field(Field::text(3))
            .field(Field::section(1).logic(RuleGroup::show_if_all([field(3).is("x")])))
            .field(Field::text(2))
            .compile()
            .unwrap();
        assert_eq!(form.dependents_of(3), &[TargetId::Field(1)]);
        assert_eq!(form.graph().members_of(TargetId::Field(1)), &[TargetId::Field(2)]);
    }

    #[test]
    fn topo_sort_triggers_before_dependents() {
        let form = FormBuilder::new()
            .field(Field::text(3).logic(RuleGroup::show_if_all([field(2).is("b")])))
            .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("a")])))
            .field(Field::text(1))
            .compile()
            .unwrap();
        let rank = |id| form.graph().rank(TargetId::Field(id)).unwrap();
        assert!(rank(1) < rank(2));
        assert!(rank(2) < rank(3));
    }

    #[test]
    fn diamond_dependency_compiles() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::text(2).logic(RuleGroup::show_if_all([field(1).is("a")])))
            .field(Field::text(3).logic(RuleGroup::show_if_all([field(1).is("a")])))
            .field(
                Field::text(4)
                    .logic(RuleGroup::show_if_all([field(2).is("a"), field(3).is("b")])),
            )
            .compile()
            .unwrap();
        assert_eq!(form.dependents_of(1), &[TargetId::Field(2), TargetId::Field(3)]);
        assert_eq!(
            form.affected_by([2, 3, 2]),
            vec![TargetId::Field(4)]
        );
        assert_eq!(
            form.affected_by([1, 2]),
            vec![TargetId::Field(2), TargetId::Field(3), TargetId::Field(4)]
        );
    }

    #[test]
    fn sections_and_pages_own_following_fields() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::section(2))
            .field(Field::text(3))
            .field(Field::page(4))
            .field(Field::text(5))
            .field(Field::section(6))
            .field(Field::text(7))
            .compile()
            .unwrap();
        let graph = form.graph();
        assert_eq!(graph.container_of(TargetId::Field(1)), None);
        assert_eq!(graph.container_of(TargetId::Field(3)), Some(TargetId::Field(2)));
        assert_eq!(graph.container_of(TargetId::Field(2)), None);
        assert_eq!(graph.container_of(TargetId::Field(5)), Some(TargetId::Page(2)));
        assert_eq!(graph.container_of(TargetId::Field(6)), Some(TargetId::Page(2)));
        assert_eq!(graph.container_of(TargetId::Field(7)), Some(TargetId::Field(6)));
        assert_eq!(
            graph.members_of(TargetId::Page(2)),
            &[TargetId::Field(5), TargetId::Field(6)]
        );
        assert!(!graph.contains(TargetId::Field(4)));
    }

    #[test]
    fn honeypot_is_never_a_target() {
        let form = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::text(9).honeypot().logic(RuleGroup::show_if_all([field(1).is("a")])))
            .compile()
            .unwrap();
        assert!(!form.graph().contains(TargetId::Field(9)));
        assert!(form.dependents_of(1).is_empty());
    }

    #[test]
    fn unknown_trigger_compiles_to_unsatisfiable_rule() {
        let form = FormBuilder::new()
            .field(Field::checkbox(1, ["a", "b"]))
            .field(
                Field::text(2)
                    .logic(RuleGroup::show_if_any([field(99).is("x"), input(1, 5).is("a")])),
            )
            .compile()
            .unwrap();
        let group = form.graph().group(TargetId::Field(2)).unwrap();
        assert!(group.rules().iter().all(|r| !r.satisfiable));
        assert!(form.dependents_of(1).is_empty());
        assert!(form.dependents_of(99).is_empty());
    }

    #[test]
    fn quantity_must_point_at_a_product() {
        let result = FormBuilder::new()
            .field(Field::text(1))
            .field(Field::new(2, FieldKind::Quantity { product_id: 1 }))
            .compile();
        assert!(matches!(
            result,
            Err(CompileError::UnknownProduct { field: 2, product: 1 })
        ));
    }

    #[test]
    fn malformed_formula_is_rejected() {
        let result = FormBuilder::new()
            .field(Field::new(
                1,
                FieldKind::Calculation {
                    formula: "(1 +".into(),
                    rounding: None,
                },
            ))
            .compile();
        assert!(matches!(result, Err(CompileError::InvalidFormula { field: 1, .. })));
    }
}
