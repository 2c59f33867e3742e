use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{Parameter, ParameterId};
use crate::services::basket::SelectionBasket;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, instrument, warn};

/// Structural problems found while indexing the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogIssue {
    /// `parent_id` points at a parameter that does not exist (or is hidden).
    Orphan {
        parameter_id: ParameterId,
        missing_parent: ParameterId,
    },
    /// These parameters form a parent loop and cannot be reached from a root.
    Cycle { members: Vec<ParameterId> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowKind {
    Category,
    Leaf {
        price: Decimal,
        selected: bool,
        quantity: Option<u32>,
    },
}

/// One line of the rendered selection view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogRow {
    pub parameter_id: ParameterId,
    pub name: String,
    pub depth: usize,
    #[serde(flatten)]
    pub kind: RowKind,
}

/// Indexed, visible-only view of the parameter tree.
///
/// Orphans and cycle members get no effective parent, so every visible
/// parameter is reachable from [`ParameterCatalog::children_of`]`(None)`.
#[derive(Clone, Debug, Default)]
pub struct ParameterCatalog {
    order: Vec<ParameterId>,
    by_id: HashMap<ParameterId, Parameter>,
    parent_of: HashMap<ParameterId, Option<ParameterId>>,
    children: BTreeMap<Option<ParameterId>, Vec<ParameterId>>,
    issues: Vec<CatalogIssue>,
}

impl ParameterCatalog {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        let mut order = Vec::new();
        let mut by_id = HashMap::new();
        for parameter in parameters.into_iter().filter(Parameter::is_visible) {
            if by_id.contains_key(&parameter.id) {
                warn!(parameter_id = parameter.id, "duplicate parameter id ignored");
                continue;
            }
            order.push(parameter.id);
            by_id.insert(parameter.id, parameter);
        }

        let mut issues = Vec::new();
        let mut parent_of: HashMap<ParameterId, Option<ParameterId>> = HashMap::new();
        for id in &order {
            let parent = by_id[id].parent_id;
            let effective = match parent {
                Some(parent) if !by_id.contains_key(&parent) => {
                    warn!(parameter_id = id, missing_parent = parent, "orphaned parameter treated as root");
                    issues.push(CatalogIssue::Orphan {
                        parameter_id: *id,
                        missing_parent: parent,
                    });
                    None
                }
                other => other,
            };
            parent_of.insert(*id, effective);
        }

        for members in find_cycles(&order, &parent_of) {
            warn!(?members, "parameter cycle detected; members rendered as roots");
            for member in &members {
                parent_of.insert(*member, None);
            }
            issues.push(CatalogIssue::Cycle { members });
        }

        let mut children: BTreeMap<Option<ParameterId>, Vec<ParameterId>> = BTreeMap::new();
        for id in &order {
            children.entry(parent_of[id]).or_default().push(*id);
        }

        Self {
            order,
            by_id,
            parent_of,
            children,
            issues,
        }
    }

    #[instrument(skip(api))]
    pub async fn load(api: &dyn LabApi) -> Result<Self, ServiceError> {
        let parameters = api.list_parameters().await?;
        let catalog = Self::new(parameters);
        info!(
            parameters = catalog.len(),
            issues = catalog.issues.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn issues(&self) -> &[CatalogIssue] {
        &self.issues
    }

    /// Every visible parameter, in API order.
    pub fn list_parameters(&self) -> Vec<&Parameter> {
        self.order.iter().map(|id| &self.by_id[id]).collect()
    }

    pub fn get(&self, id: ParameterId) -> Option<&Parameter> {
        self.by_id.get(&id)
    }

    pub fn is_leaf(parameter: &Parameter) -> bool {
        parameter.is_leaf()
    }

    pub fn children_of(&self, parent_id: Option<ParameterId>) -> Vec<&Parameter> {
        self.children
            .get(&parent_id)
            .map(|ids| ids.iter().map(|id| &self.by_id[id]).collect())
            .unwrap_or_default()
    }

    pub fn has_children(&self, id: ParameterId) -> bool {
        self.children.get(&Some(id)).is_some_and(|ids| !ids.is_empty())
    }

    /// Priced leaves whose name contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Vec<&Parameter> {
        let needle = term.trim().to_lowercase();
        self.list_parameters()
            .into_iter()
            .filter(|p| p.is_leaf() && p.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Ancestors from the root down to the direct parent.
    pub fn ancestors(&self, id: ParameterId) -> Vec<&Parameter> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.parent_of.get(&id).copied().flatten();
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            chain.push(&self.by_id[&parent]);
            current = self.parent_of.get(&parent).copied().flatten();
        }
        chain.reverse();
        chain
    }

    /// "Water Tests > pH"
    pub fn path_name(&self, id: ParameterId) -> Option<String> {
        let parameter = self.get(id)?;
        let mut names: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        names.push(&parameter.name);
        Some(names.join(" > "))
    }

    /// Ids of parameters that never act as a parent.
    pub fn unparented_ids(&self) -> Vec<ParameterId> {
        self.order
            .iter()
            .copied()
            .filter(|id| !self.has_children(*id))
            .collect()
    }

    /// Depth-first rows of the whole tree with selection state from `basket`.
    pub fn render_hierarchy(&self, basket: &SelectionBasket) -> Vec<CatalogRow> {
        let mut rows = Vec::with_capacity(self.order.len());
        let mut stack: Vec<(ParameterId, usize)> = self
            .children
            .get(&None)
            .map(|roots| roots.iter().rev().map(|id| (*id, 0)).collect())
            .unwrap_or_default();

        while let Some((id, depth)) = stack.pop() {
            let parameter = &self.by_id[&id];
            rows.push(self.row(parameter, depth, basket));
            if let Some(children) = self.children.get(&Some(id)) {
                stack.extend(children.iter().rev().map(|child| (*child, depth + 1)));
            }
        }
        rows
    }

    /// Flat rows for a non-empty search term, the hierarchy otherwise.
    pub fn render(&self, search_term: &str, basket: &SelectionBasket) -> Vec<CatalogRow> {
        if search_term.trim().is_empty() {
            return self.render_hierarchy(basket);
        }
        self.search(search_term)
            .into_iter()
            .map(|parameter| self.row(parameter, 0, basket))
            .collect()
    }

    fn row(&self, parameter: &Parameter, depth: usize, basket: &SelectionBasket) -> CatalogRow {
        let kind = match parameter.price {
            None => RowKind::Category,
            Some(price) => {
                let entry = basket.get(parameter.id);
                RowKind::Leaf {
                    price,
                    selected: entry.is_some(),
                    quantity: entry.map(|e| e.quantity),
                }
            }
        };
        CatalogRow {
            parameter_id: parameter.id,
            name: parameter.name.clone(),
            depth,
            kind,
        }
    }
}

/// Returns each parent loop once, members in discovery order.
fn find_cycles(
    order: &[ParameterId],
    parent_of: &HashMap<ParameterId, Option<ParameterId>>,
) -> Vec<Vec<ParameterId>> {
    let mut settled: HashSet<ParameterId> = HashSet::new();
    let mut cycles = Vec::new();

    for start in order {
        if settled.contains(start) {
            continue;
        }
        let mut path: Vec<ParameterId> = Vec::new();
        let mut on_path: HashMap<ParameterId, usize> = HashMap::new();
        let mut current = Some(*start);

        while let Some(id) = current {
            if settled.contains(&id) {
                break;
            }
            if let Some(&position) = on_path.get(&id) {
                cycles.push(path[position..].to_vec());
                break;
            }
            on_path.insert(id, path.len());
            path.push(id);
            current = parent_of.get(&id).copied().flatten();
        }
        settled.extend(path);
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn param(id: ParameterId, name: &str, parent: Option<ParameterId>, price: Option<Decimal>) -> Parameter {
        Parameter {
            id,
            name: name.into(),
            parent_id: parent,
            price,
            unit: None,
            min_range: None,
            max_range: None,
            is_3025_method: None,
            apha_24th_edition_method: None,
            is_active: Some(true),
            is_delete: Some(false),
        }
    }

    #[test]
    fn cycle_members_become_roots() {
        let catalog = ParameterCatalog::new(vec![
            param(1, "Water Tests", None, None),
            param(2, "Loop A", Some(3), None),
            param(3, "Loop B", Some(2), Some(dec!(50))),
            param(4, "Below loop", Some(3), Some(dec!(20))),
        ]);

        assert_eq!(
            catalog.issues(),
            &[CatalogIssue::Cycle { members: vec![2, 3] }]
        );
        let roots: Vec<_> = catalog.children_of(None).iter().map(|p| p.id).collect();
        assert_eq!(roots, vec![1, 2, 3]);

        let rows = catalog.render_hierarchy(&SelectionBasket::new());
        let rendered: Vec<_> = rows.iter().map(|r| (r.parameter_id, r.depth)).collect();
        assert_eq!(rendered, vec![(1, 0), (2, 0), (3, 0), (4, 1)]);
    }

    #[test]
    fn orphan_is_reported_and_rooted() {
        let catalog = ParameterCatalog::new(vec![param(5, "Lost", Some(77), Some(dec!(10)))]);
        assert_eq!(
            catalog.issues(),
            &[CatalogIssue::Orphan {
                parameter_id: 5,
                missing_parent: 77
            }]
        );
        assert_eq!(catalog.children_of(None).len(), 1);
        assert_eq!(catalog.path_name(5).as_deref(), Some("Lost"));
    }

    #[test]
    fn self_parent_is_a_cycle_of_one() {
        let catalog = ParameterCatalog::new(vec![param(9, "Self", Some(9), None)]);
        assert_eq!(catalog.issues(), &[CatalogIssue::Cycle { members: vec![9] }]);
        assert!(catalog.ancestors(9).is_empty());
    }
}
