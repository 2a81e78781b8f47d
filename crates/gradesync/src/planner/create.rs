use crate::tree::{validate, DeclaredTree, EntityKind, GradeNode, ValidationError};

use super::{Action, ActionId, ActionPlan, Intent, Target};

struct PendingFormula<'a> {
    owner: ActionId,
    kind: EntityKind,
    name: &'a str,
    formula: &'a str,
}

/// Builds the plan that creates `tree` from nothing.
///
/// Creates are emitted pre-order so every node's create precedes those of
/// its descendants; each child depends on its parent's create. Formulas are
/// set at the very end, once every entity they may reference exists.
pub fn plan_create(tree: &DeclaredTree) -> Result<ActionPlan, Vec<ValidationError>> {
    let errors = validate(tree);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut plan = ActionPlan::new(Intent::Create, tree.config().clone());
    let mut formulas = Vec::new();
    emit(&mut plan, &mut formulas, tree.root(), Target::CourseRoot, None);

    for pending in formulas {
        plan.push(
            Action::SetFormula {
                target: Target::Created { by: pending.owner },
                kind: pending.kind,
                name: pending.name.to_string(),
                formula: pending.formula.to_string(),
            },
            Some(pending.owner),
        );
    }

    log::debug!(
        "Create plan for '{}': {} actions",
        tree.parent_name(),
        plan.len()
    );
    Ok(plan)
}

fn emit<'a>(
    plan: &mut ActionPlan,
    formulas: &mut Vec<PendingFormula<'a>>,
    node: &'a GradeNode,
    parent: Target,
    depends_on: Option<ActionId>,
) {
    let action = match node {
        GradeNode::Category {
            name,
            aggregation_coefficient,
            ..
        } => Action::CreateCategory {
            name: name.clone(),
            parent,
            aggregation_coefficient: *aggregation_coefficient,
        },
        GradeNode::Item {
            name,
            aggregation_coefficient,
            ..
        } => Action::CreateItem {
            name: name.clone(),
            parent,
            aggregation_coefficient: *aggregation_coefficient,
            id_number: node.id_number().map(str::to_string),
        },
    };
    let id = plan.push(action, depends_on);

    if let Some(formula) = node.effective_formula() {
        formulas.push(PendingFormula {
            owner: id,
            kind: node.kind(),
            name: node.name(),
            formula,
        });
    }

    for child in node.children() {
        emit(plan, formulas, child, Target::Created { by: id }, Some(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ActionKind;
    use crate::tree::GlobalGradeConfig;

    fn scenario() -> DeclaredTree {
        DeclaredTree::new(
            "RA",
            vec![GradeNode::category(
                "RA1",
                vec![GradeNode::item("CE1.1"), GradeNode::item("CE1.2")],
            )],
            GlobalGradeConfig::default(),
        )
    }

    #[test]
    fn test_minimal_scenario_has_four_actions() {
        let plan = plan_create(&scenario()).unwrap();
        let summary: Vec<_> = plan
            .actions()
            .iter()
            .map(|a| (a.action.kind(), a.action.entity_name()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ActionKind::CreateCategory, "RA"),
                (ActionKind::CreateCategory, "RA1"),
                (ActionKind::CreateItem, "CE1.1"),
                (ActionKind::CreateItem, "CE1.2"),
            ]
        );
    }

    #[test]
    fn test_children_depend_on_parent_create() {
        let plan = plan_create(&scenario()).unwrap();
        let actions = plan.actions();
        assert_eq!(actions[0].depends_on, None);
        assert_eq!(actions[1].depends_on, Some(ActionId(0)));
        assert_eq!(actions[2].depends_on, Some(ActionId(1)));
        assert!(matches!(
            actions[3].action,
            Action::CreateItem {
                parent: Target::Created { by: ActionId(1) },
                ..
            }
        ));
        assert!(plan.precedes(ActionId(0), ActionId(3)));
    }

    #[test]
    fn test_formulas_are_appended_last() {
        let tree = DeclaredTree::new(
            "RA",
            vec![
                GradeNode::category(
                    "RA1",
                    vec![
                        GradeNode::item("CE1.1").with_formula("=[[a]]"),
                        GradeNode::item("CE1.2").with_formula(""),
                    ],
                )
                .with_formula("=[[b]]"),
                GradeNode::category("RA2", vec![GradeNode::item("CE2.1")]),
            ],
            GlobalGradeConfig::default(),
        );
        let plan = plan_create(&tree).unwrap();
        let kinds: Vec<_> = plan.actions().iter().map(|a| a.action.kind()).collect();
        assert_eq!(kinds.len(), 8);
        assert!(kinds[..6].iter().all(|k| *k != ActionKind::SetFormula));
        assert!(kinds[6..].iter().all(|k| *k == ActionKind::SetFormula));

        // RA1's formula first, owned by its create.
        let ra1_formula = &plan.actions()[6];
        assert_eq!(ra1_formula.action.entity_name(), "RA1");
        assert_eq!(ra1_formula.depends_on, Some(ActionId(1)));
        assert_eq!(plan.actions()[7].action.entity_name(), "CE1.1");
    }

    #[test]
    fn test_item_fields_are_carried() {
        let tree = DeclaredTree::new(
            "RA",
            vec![GradeNode::category(
                "RA1",
                vec![GradeNode::item("CE1.1")
                    .with_coefficient(2.0)
                    .with_id_number("ce11")],
            )
            .with_coefficient(40.0)],
            GlobalGradeConfig::default(),
        );
        let plan = plan_create(&tree).unwrap();
        assert!(matches!(
            &plan.actions()[1].action,
            Action::CreateCategory { aggregation_coefficient, .. } if *aggregation_coefficient == 40.0
        ));
        assert!(matches!(
            &plan.actions()[2].action,
            Action::CreateItem { aggregation_coefficient, id_number: Some(id), .. }
                if *aggregation_coefficient == 2.0 && id == "ce11"
        ));
    }

    #[test]
    fn test_invalid_tree_is_rejected() {
        let tree = DeclaredTree::new(
            "",
            vec![GradeNode::category("RA1", vec![])],
            GlobalGradeConfig::default(),
        );
        let errors = plan_create(&tree).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyParentName]);
    }
}
