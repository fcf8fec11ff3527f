//! End-to-end flow: build a budget through the planner, export it, and
//! estimate it again from the export.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use taskbudget::db::{Database, MemoryStore};
use taskbudget::estimation::{encode_time, format_hours};
use taskbudget::models::{
    BudgetDraft, CsuDraft, CsuUpdate, ItemDraft, ItemSelection, TaskDraft, TaskSelection,
};
use taskbudget::{ErrorPolicy, Estimator, Planner};

const USER: &str = "demo";

fn task(description: &str, low: &str, medium: &str, high: &str) -> TaskDraft {
    TaskDraft {
        description: description.to_string(),
        complexity_low: Some(low.to_string()),
        complexity_medium: Some(medium.to_string()),
        complexity_high: Some(high.to_string()),
        complexity_very_high: None,
    }
}

#[tokio::test]
async fn test_budget_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let planner = Planner::new(store.clone(), ErrorPolicy::Lenient);

    let schema = planner
        .create_task(USER, &task("Schema", "1:30", "4", "8"))
        .await
        .unwrap();
    let api = planner
        .create_task(USER, &task("API", "2", "3:15", "6:45"))
        .await
        .unwrap();
    let deploy = planner
        .create_task(USER, &task("Deploy", "0:30", "1", "2"))
        .await
        .unwrap();

    let backend = planner
        .create_item(
            USER,
            &ItemDraft {
                name: "Backend".to_string(),
                description: "Storage and API".to_string(),
                task_ids: vec![schema.id, api.id],
            },
        )
        .await
        .unwrap();

    let budget = planner
        .create_budget(USER, &BudgetDraft { name: "Customer portal".to_string() })
        .await
        .unwrap();

    let csu = planner
        .create_csu(&CsuDraft {
            budget_id: budget.id,
            name: "Sign up".to_string(),
            description: String::new(),
            items: vec![ItemSelection {
                item_id: backend.id,
                complexity: "medium".to_string(),
            }],
            tasks: vec![TaskSelection {
                task_id: deploy.id,
                complexity: "low".to_string(),
            }],
        })
        .await
        .unwrap();
    // 4 + 3.25 for the item, 0.5 for the task
    assert_eq!(planner.csu_hours(csu.id).await.unwrap(), dec!(7.75));

    planner
        .add_item_to_csu(
            csu.id,
            &ItemSelection {
                item_id: backend.id,
                complexity: "very_high".to_string(),
            },
        )
        .await
        .unwrap();
    // No very-high estimates: the new link adds nothing.
    assert_eq!(planner.csu_hours(csu.id).await.unwrap(), dec!(7.75));

    let updated = planner
        .update_csu(
            csu.id,
            &CsuUpdate {
                name: "Sign up".to_string(),
                description: "Reworked".to_string(),
                items: Some(vec![ItemSelection {
                    item_id: backend.id,
                    complexity: "high".to_string(),
                }]),
                tasks: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.item_links.len(), 1);
    assert_eq!(updated.task_links.len(), 1);
    assert_eq!(updated.item_links[0].calculated_hours, Some(dec!(14.75)));

    let reports = planner.budget_reports(USER).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total_hours, dec!(15.25));
    assert_eq!(encode_time(reports[0].total_hours), "15:15");
    assert_eq!(format_hours(reports[0].total_hours), "15h15m");

    // Round-trip the store's read shape through JSON.
    let budgets = store.list_budgets(USER).await.unwrap();
    let export = serde_json::to_string_pretty(&budgets).unwrap();
    let imported: Vec<taskbudget::models::Budget> = serde_json::from_str(&export).unwrap();
    assert_eq!(imported, budgets);

    let stats = Estimator::lenient().budget_stats(&imported).unwrap();
    assert_eq!(stats.total_hours, dec!(15.25));
    assert_eq!(stats.active_budgets, 1);

    let reloaded = Planner::new(Arc::new(MemoryStore::with_budgets(imported)), ErrorPolicy::Lenient);
    let again = reloaded.budget_reports(USER).await.unwrap();
    assert_eq!(again, reports);

    assert!(planner.delete_budget(budget.id).await.unwrap());
    assert!(planner.get_csu(csu.id).await.is_err());
    let dashboard = planner.dashboard(USER).await.unwrap();
    assert_eq!(dashboard.budgets.total_hours, Decimal::ZERO);
    assert_eq!(dashboard.total_tasks, 3);
    assert_eq!(dashboard.total_items, 1);
}

#[tokio::test]
async fn test_legacy_links_without_hours_are_recomputed() {
    // Links written before hours were stored carry no calculated_hours.
    let export = r#"[
      {
        "id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b01",
        "user_id": "demo",
        "name": "Legacy",
        "created_at": "2024-03-01T10:00:00Z",
        "csus": [
          {
            "id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b02",
            "budget_id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b01",
            "name": "Import",
            "description": "",
            "created_at": "2024-03-01T10:05:00Z",
            "csu_items": [
              {
                "id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b03",
                "item_id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b04",
                "complexity": "medium",
                "items": {
                  "id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b04",
                  "name": "Parser",
                  "description": "",
                  "created_at": "2024-02-01T09:00:00Z",
                  "tasks": [
                    {
                      "id": "6f1c1f52-8c1e-4a8e-9a57-0a4a2b2f7b05",
                      "description": "Tokenizer",
                      "complexity_low": "1:30",
                      "complexity_medium": "4:00",
                      "created_at": "2024-02-01T08:00:00Z"
                    }
                  ]
                }
              }
            ],
            "csu_tasks": []
          }
        ]
      }
    ]"#;
    let budgets: Vec<taskbudget::models::Budget> = serde_json::from_str(export).unwrap();

    let report = Estimator::lenient().budget_report(&budgets[0]).unwrap();
    assert_eq!(report.total_hours, dec!(4));
    assert!(report.csus[0].recomputed);

    let strict = Estimator::strict().budget_report(&budgets[0]).unwrap();
    assert_eq!(strict, report);
}
