//! Product lookup behind a trait so screens and routine composition do not
//! depend on where product data comes from. Only fixture data ships today.

use shared::domain::{
    Alternative, CandidateProduct, KeyIngredient, PersonalizedScore, Product, ProductId,
    SafetyStatus,
};

pub trait ProductCatalog: Send + Sync {
    fn get_product_by_id(&self, id: ProductId) -> Option<Product>;
    /// Case-insensitive substring match on name, brand and category.
    fn search_products(&self, query: &str) -> Vec<Product>;
    /// Products offered when composing a new routine.
    fn candidate_products(&self) -> Vec<CandidateProduct>;
}

pub struct SampleCatalog {
    products: Vec<Product>,
    candidates: Vec<CandidateProduct>,
}

impl Default for SampleCatalog {
    fn default() -> Self {
        Self {
            products: sample_products(),
            candidates: sample_candidates(),
        }
    }
}

impl SampleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates_by_ids(&self, ids: &[ProductId]) -> Vec<CandidateProduct> {
        ids.iter()
            .filter_map(|id| self.candidates.iter().find(|c| c.id == *id).cloned())
            .collect()
    }
}

impl ProductCatalog for SampleCatalog {
    fn get_product_by_id(&self, id: ProductId) -> Option<Product> {
        self.products.iter().find(|p| p.id == id).cloned()
    }

    fn search_products(&self, query: &str) -> Vec<Product> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.brand.to_lowercase().contains(&query)
                    || p.category.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    fn candidate_products(&self) -> Vec<CandidateProduct> {
        self.candidates.clone()
    }
}

fn summary(id: i64, name: &str, brand: &str, category: &str, image: &str) -> Product {
    Product {
        id: ProductId(id),
        name: name.into(),
        brand: brand.into(),
        category: category.into(),
        image: image.into(),
        price: None,
        rating: None,
        personalized_score: None,
        key_ingredients: Vec::new(),
        all_ingredients: Vec::new(),
        alternatives: Vec::new(),
    }
}

fn ingredient(name: &str, purpose: &str, description: &str) -> KeyIngredient {
    KeyIngredient {
        name: name.into(),
        purpose: purpose.into(),
        safety: SafetyStatus::Safe,
        description: description.into(),
    }
}

fn sample_products() -> Vec<Product> {
    let mut cerave = summary(
        1,
        "CeraVe Hydrating Cleanser",
        "CeraVe",
        "Cleanser",
        "/cerave-cleanser.png",
    );
    cerave.price = Some("$12.99".into());
    cerave.rating = Some(4.5);
    cerave.personalized_score = Some(PersonalizedScore {
        status: SafetyStatus::Safe,
        score: 85,
        message: "Great match for your combination skin!".into(),
    });
    cerave.key_ingredients = vec![
        ingredient(
            "Ceramides",
            "Barrier repair",
            "Help restore and maintain the skin's natural barrier",
        ),
        ingredient(
            "Hyaluronic Acid",
            "Hydration",
            "Attracts and retains moisture in the skin",
        ),
        ingredient(
            "Niacinamide",
            "Skin conditioning",
            "Helps improve skin texture and minimize pores",
        ),
    ];
    cerave.all_ingredients = [
        "Water",
        "Glycerin",
        "Ceramide NP",
        "Ceramide AP",
        "Ceramide EOP",
        "Carbomer",
        "Dimethicone",
        "Cetearyl Alcohol",
        "Behentrimonium Methosulfate",
        "Sodium Lauroyl Lactylate",
        "Sodium Hyaluronate",
        "Cholesterol",
        "Phenoxyethanol",
        "Disodium EDTA",
        "Dipotassium Phosphate",
        "Sodium Phosphate",
        "Tocopherol",
        "Phytosphingosine",
        "Xanthan Gum",
        "Ethylhexylglycerin",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect();
    cerave.alternatives = vec![
        Alternative {
            id: ProductId(3),
            name: "Neutrogena Ultra Gentle Daily Cleanser".into(),
            brand: "Neutrogena".into(),
            price: "$8.99".into(),
            score: 82,
            image: "/neutrogena-cleanser.png".into(),
        },
        Alternative {
            id: ProductId(11),
            name: "La Roche-Posay Toleriane Caring Wash".into(),
            brand: "La Roche-Posay".into(),
            price: "$15.99".into(),
            score: 88,
            image: "/laroche-cleanser.png".into(),
        },
    ];

    vec![
        cerave,
        summary(
            2,
            "The Ordinary Niacinamide 10% + Zinc 1%",
            "The Ordinary",
            "Serum",
            "/ordinary-niacinamide.png",
        ),
        summary(
            3,
            "Neutrogena Ultra Gentle Daily Cleanser",
            "Neutrogena",
            "Cleanser",
            "/neutrogena-cleanser.png",
        ),
        summary(
            4,
            "La Roche-Posay Toleriane Double Repair Moisturizer",
            "La Roche-Posay",
            "Moisturizer",
            "/laroche-moisturizer.png",
        ),
    ]
}

fn candidate(
    id: i64,
    name: &str,
    category: &str,
    conflicts: &[&str],
    warning: Option<&str>,
) -> CandidateProduct {
    CandidateProduct {
        id: ProductId(id),
        name: name.into(),
        category: category.into(),
        conflicts: conflicts.iter().map(|tag| tag.to_string()).collect(),
        warning: warning.map(str::to_string),
    }
}

fn sample_candidates() -> Vec<CandidateProduct> {
    vec![
        candidate(1, "Gentle Foaming Cleanser", "Cleanser", &[], None),
        candidate(2, "Hydrating Toner", "Toner", &[], None),
        candidate(
            3,
            "Vitamin C Serum",
            "Serum",
            &["retinol"],
            Some("Avoid using with retinol products"),
        ),
        candidate(4, "Daily Moisturizing Lotion", "Moisturizer", &[], None),
        candidate(5, "Broad Spectrum SPF 30", "Sunscreen", &[], None),
        candidate(
            6,
            "Retinol Treatment",
            "Treatment",
            &["vitamin-c"],
            Some("Avoid using with Vitamin C in same routine"),
        ),
    ]
}
