//! Dashboard statistics computed from the current sync snapshot.
//!
//! Missing ratings are skipped, not treated as zero: every average is the
//! mean of the values actually present, or null when none are.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Evaluation;
use crate::sync::SyncSnapshot;

/// The five evaluative categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Content,
    Methods,
    Organization,
    Behavior,
    Cognitive,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Content,
        Category::Methods,
        Category::Organization,
        Category::Behavior,
        Category::Cognitive,
    ];

    /// The three sub-scores backing this category.
    fn ratings(self, evaluation: &Evaluation) -> [Option<f64>; 3] {
        match self {
            Category::Content => [
                evaluation.content_objectives,
                evaluation.content_relevance,
                evaluation.content_depth,
            ],
            Category::Methods => [
                evaluation.methods_pedagogy,
                evaluation.methods_materials,
                evaluation.methods_pacing,
            ],
            Category::Organization => [
                evaluation.organization_scheduling,
                evaluation.organization_logistics,
                evaluation.organization_environment,
            ],
            Category::Behavior => [
                evaluation.behavior_engagement,
                evaluation.behavior_punctuality,
                evaluation.behavior_teamwork,
            ],
            Category::Cognitive => [
                evaluation.cognitive_understanding,
                evaluation.cognitive_retention,
                evaluation.cognitive_application,
            ],
        }
    }
}

/// Mean of the sub-scores present for one category of one evaluation.
pub fn category_score(category: Category, evaluation: &Evaluation) -> Option<f64> {
    mean_of(category.ratings(evaluation).into_iter().flatten())
}

/// Mean of the category scores that are computable for one evaluation.
pub fn overall_score(evaluation: &Evaluation) -> Option<f64> {
    mean_of(
        Category::ALL
            .iter()
            .filter_map(|category| category_score(*category, evaluation)),
    )
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

/// Per-category averages across all evaluations. Fields stay present as
/// nulls when no evaluation carries the category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverages {
    pub content: Option<f64>,
    pub methods: Option<f64>,
    pub organization: Option<f64>,
    pub behavior: Option<f64>,
    pub cognitive: Option<f64>,
}

/// Activity of one theme name, as copied into evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeActivity {
    pub name: String,
    pub evaluation_count: usize,
    pub average_score: Option<f64>,
}

/// Aggregates shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub staff_count: usize,
    pub theme_count: usize,
    pub evaluation_count: usize,
    pub average_recommendation: Option<f64>,
    pub category_averages: CategoryAverages,
    pub theme_activity: Vec<ThemeActivity>,
}

/// Aggregate a snapshot into dashboard statistics.
pub fn compute(snapshot: &SyncSnapshot) -> DashboardStats {
    let evaluations = &snapshot.evaluations;

    let category_averages = CategoryAverages {
        content: average_category(Category::Content, evaluations),
        methods: average_category(Category::Methods, evaluations),
        organization: average_category(Category::Organization, evaluations),
        behavior: average_category(Category::Behavior, evaluations),
        cognitive: average_category(Category::Cognitive, evaluations),
    };

    DashboardStats {
        staff_count: snapshot.staff.len(),
        theme_count: snapshot.themes.len(),
        evaluation_count: evaluations.len(),
        average_recommendation: mean_of(
            evaluations.iter().filter_map(|e| e.recommendation_score),
        ),
        category_averages,
        theme_activity: theme_activity(evaluations),
    }
}

fn average_category(category: Category, evaluations: &[Evaluation]) -> Option<f64> {
    mean_of(
        evaluations
            .iter()
            .filter_map(|evaluation| category_score(category, evaluation)),
    )
}

/// Evaluations grouped by their denormalized theme name. Names with no
/// matching Theme record still form a group; blank names are skipped.
/// Sorted by activity, busiest first, ties by name.
fn theme_activity(evaluations: &[Evaluation]) -> Vec<ThemeActivity> {
    let mut groups: BTreeMap<&str, Vec<&Evaluation>> = BTreeMap::new();
    for evaluation in evaluations {
        let name = evaluation.formation_theme.trim();
        if name.is_empty() {
            continue;
        }
        groups.entry(name).or_default().push(evaluation);
    }

    let mut activity: Vec<ThemeActivity> = groups
        .into_iter()
        .map(|(name, group)| ThemeActivity {
            name: name.to_string(),
            evaluation_count: group.len(),
            average_score: mean_of(group.iter().filter_map(|e| overall_score(e))),
        })
        .collect();
    activity.sort_by(|a, b| {
        b.evaluation_count
            .cmp(&a.evaluation_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    activity
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::models::{StaffMember, Theme};

    fn evaluation(value: serde_json::Value) -> Evaluation {
        serde_json::from_value(value).unwrap()
    }

    fn staff(id: i64) -> StaffMember {
        serde_json::from_value(json!({
            "id": id, "firstName": "Marie", "lastName": "RAKOTO", "email": "m@example.mg"
        }))
        .unwrap()
    }

    fn theme(id: i64, name: &str) -> Theme {
        serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
    }

    fn snapshot(
        staff: Vec<StaffMember>,
        evaluations: Vec<Evaluation>,
        themes: Vec<Theme>,
    ) -> SyncSnapshot {
        SyncSnapshot {
            staff: Arc::new(staff),
            evaluations: Arc::new(evaluations),
            themes: Arc::new(themes),
            ..SyncSnapshot::default()
        }
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_category_score_skips_missing_ratings() {
        let e = evaluation(json!({
            "id": 1, "formationTheme": "Accueil",
            "contentObjectives": 4, "contentRelevance": 5
        }));
        assert!(close(category_score(Category::Content, &e), 4.5));
        assert_eq!(category_score(Category::Methods, &e), None);
    }

    #[test]
    fn test_overall_score_averages_computable_categories() {
        let e = evaluation(json!({
            "id": 1, "formationTheme": "Accueil",
            "contentObjectives": 4, "contentRelevance": 4, "contentDepth": 4,
            "behaviorEngagement": 2
        }));
        // content = 4, behavior = 2, three categories missing
        assert!(close(overall_score(&e), 3.0));
    }

    #[test]
    fn test_overall_score_empty_evaluation_is_none() {
        let e = evaluation(json!({ "id": 1, "formationTheme": "Accueil" }));
        assert_eq!(overall_score(&e), None);
    }

    #[test]
    fn test_compute_counts_and_recommendation_average() {
        let snapshot = snapshot(
            vec![staff(1), staff(2)],
            vec![
                evaluation(json!({
                    "id": 1, "formationTheme": "Accueil", "recommendationScore": 4
                })),
                evaluation(json!({
                    "id": 2, "formationTheme": "Accueil", "recommendationScore": 5
                })),
                evaluation(json!({ "id": 3, "formationTheme": "Accueil" })),
            ],
            vec![theme(1, "Accueil")],
        );

        let stats = compute(&snapshot);
        assert_eq!(stats.staff_count, 2);
        assert_eq!(stats.theme_count, 1);
        assert_eq!(stats.evaluation_count, 3);
        // The evaluation without a recommendation is excluded, not counted as 0
        assert!(close(stats.average_recommendation, 4.5));
    }

    #[test]
    fn test_category_averages_span_evaluations() {
        let snapshot = snapshot(
            Vec::new(),
            vec![
                evaluation(json!({
                    "id": 1, "formationTheme": "A", "methodsPedagogy": 3, "methodsPacing": 5
                })),
                evaluation(json!({ "id": 2, "formationTheme": "A", "methodsMaterials": 2 })),
                evaluation(json!({ "id": 3, "formationTheme": "A" })),
            ],
            Vec::new(),
        );

        let stats = compute(&snapshot);
        // Per-evaluation scores 4 and 2; the third evaluation contributes nothing
        assert!(close(stats.category_averages.methods, 3.0));
        assert_eq!(stats.category_averages.content, None);
    }

    #[test]
    fn test_theme_activity_groups_trims_and_sorts() {
        let snapshot = snapshot(
            Vec::new(),
            vec![
                evaluation(json!({ "id": 1, "formationTheme": "Accueil", "contentObjectives": 4 })),
                evaluation(json!({ "id": 2, "formationTheme": "  Accueil ", "contentObjectives": 2 })),
                evaluation(json!({ "id": 3, "formationTheme": "Accueil" })),
                // An orphan name with no Theme record still gets a group
                evaluation(json!({ "id": 4, "formationTheme": "Sécurité" })),
                evaluation(json!({ "id": 5, "formationTheme": "   " })),
            ],
            vec![theme(1, "Accueil")],
        );

        let stats = compute(&snapshot);
        assert_eq!(stats.theme_activity.len(), 2);
        assert_eq!(stats.theme_activity[0].name, "Accueil");
        assert_eq!(stats.theme_activity[0].evaluation_count, 3);
        assert!(close(stats.theme_activity[0].average_score, 3.0));
        assert_eq!(stats.theme_activity[1].name, "Sécurité");
        assert_eq!(stats.theme_activity[1].average_score, None);
    }

    #[test]
    fn test_theme_activity_ties_sort_by_name() {
        let snapshot = snapshot(
            Vec::new(),
            vec![
                evaluation(json!({ "id": 1, "formationTheme": "Bureautique" })),
                evaluation(json!({ "id": 2, "formationTheme": "Accueil" })),
            ],
            Vec::new(),
        );

        let stats = compute(&snapshot);
        let names: Vec<&str> = stats
            .theme_activity
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["Accueil", "Bureautique"]);
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = compute(&SyncSnapshot::default());
        assert_eq!(stats.staff_count, 0);
        assert_eq!(stats.evaluation_count, 0);
        assert_eq!(stats.average_recommendation, None);
        assert_eq!(stats.category_averages.cognitive, None);
        assert!(stats.theme_activity.is_empty());
    }
}
