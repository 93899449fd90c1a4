//! Sample routines seeded on first launch and restored by "reset to samples".

use shared::domain::{
    ProductId, Routine, RoutineCollections, RoutineId, RoutineType, ScheduleTime, Step,
};

fn instructions_for(category: &str) -> &'static str {
    match category {
        "Cleanser" | "Foam Cleanser" => {
            "Apply to damp skin, massage gently, rinse with lukewarm water"
        }
        "Oil Cleanser" => "Massage onto dry skin to dissolve sunscreen and makeup, then rinse",
        "Toner" => "Apply with cotton pad or pat gently with fingertips",
        "Serum" => "Apply 2-3 drops to clean skin, pat gently until absorbed",
        "Moisturizer" => "Apply evenly to face and neck, massage until absorbed",
        "Sunscreen" => "Apply generously 15 minutes before sun exposure",
        "Treatment" => "Apply a thin layer to affected areas only",
        "Night Cream" => "Warm between fingertips and press onto face and neck",
        _ => "Apply as directed on the packaging",
    }
}

fn step(product_id: i64, category: &str, order: u32) -> Step {
    Step {
        product_id: ProductId(product_id),
        category: category.to_string(),
        order,
        instructions: instructions_for(category).to_string(),
    }
}

fn steps(items: &[(i64, &str)]) -> Vec<Step> {
    items
        .iter()
        .zip(1u32..)
        .map(|((product_id, category), order)| step(*product_id, category, order))
        .collect()
}

fn routine(
    id: i64,
    name: &str,
    routine_type: RoutineType,
    items: &[(i64, &str)],
    (hour, minute): (u8, u8),
    enabled: bool,
    streak: u32,
) -> Routine {
    Routine {
        id: RoutineId(id),
        name: name.to_string(),
        routine_type,
        steps: steps(items),
        time: ScheduleTime::new(hour, minute).unwrap_or_default(),
        enabled,
        streak,
        last_used: None,
    }
}

pub fn sample_routines() -> RoutineCollections {
    RoutineCollections {
        morning: vec![
            routine(
                1,
                "My Morning Routine",
                RoutineType::Morning,
                &[(1, "Cleanser"), (3, "Serum"), (4, "Moisturizer"), (5, "Sunscreen")],
                (8, 0),
                true,
                7,
            ),
            routine(
                3,
                "Quick Morning Routine",
                RoutineType::Morning,
                &[(1, "Cleanser"), (4, "Moisturizer"), (5, "Sunscreen")],
                (7, 30),
                true,
                3,
            ),
            routine(
                4,
                "Intensive Morning Routine",
                RoutineType::Morning,
                &[
                    (1, "Cleanser"),
                    (2, "Toner"),
                    (3, "Serum"),
                    (4, "Moisturizer"),
                    (5, "Sunscreen"),
                ],
                (8, 30),
                false,
                0,
            ),
        ],
        evening: vec![
            routine(
                2,
                "My Evening Routine",
                RoutineType::Evening,
                &[(1, "Cleanser"), (2, "Toner"), (6, "Treatment"), (8, "Night Cream")],
                (20, 0),
                true,
                5,
            ),
            routine(
                5,
                "Deep Clean Evening",
                RoutineType::Evening,
                &[
                    (9, "Oil Cleanser"),
                    (10, "Foam Cleanser"),
                    (2, "Toner"),
                    (3, "Serum"),
                    (8, "Night Cream"),
                ],
                (21, 0),
                true,
                2,
            ),
        ],
    }
}
