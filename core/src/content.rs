use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Service lines advertised on the site, projected into every system
/// instruction so the assistant answers from real business context.
pub const WEBSITE_SERVICES: &[&str] = &[
    "Personalized Health Consultations: In-store or telephonic consultations with expert pharmacists to offer personalized health advice.",
    "Medical Equipment and Supply Sales: Blood pressure monitors, diabetes care products, and mobility aids.",
    "Health Screenings: Basic health screening services like blood pressure checks and cholesterol monitoring.",
    "Chronic Disease Support: Specialized management for diabetes, hypertension, and asthma.",
    "Wellness and Lifestyle Products: Vitamins, supplements, and wellness items for healthy lifestyles.",
    "Home Delivery of Medications: YES, we offer prompt delivery services for prescription medications and health products.",
    "Health Consultations: Our knowledgeable pharmacists are available to provide health advice and support, ensuring you make informed decisions about your health.",
];

/// Business description rendered by the page shell. Immutable once fetched;
/// the session managers only read the context projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyData {
    pub name: String,
    pub tagline: String,
    pub hero_hook: String,
    pub about: String,
    pub value_props: Vec<ValueProp>,
    pub reviews: Vec<Review>,
    pub contact_info: ContactInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueProp {
    pub title: String,
    pub description: String,
    /// Icon identifier understood by the page shell.
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub text: String,
    /// 1-5 integer rating.
    pub rating: u8,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub address: String,
    pub phone: String,
    pub email: String,
    pub hours: String,
}

impl PharmacyData {
    /// Read-only projection of the fixed business fields used to build
    /// system instructions. Passed on every call, never stored in history.
    pub fn context_summary(&self) -> String {
        format!(
            "BUSINESS: {}. Location: {}. Phone: {}. Hours: {}. Services: {}. Delivery: YES, we deliver.",
            self.name,
            self.contact_info.address,
            self.contact_info.phone,
            self.contact_info.hours,
            WEBSITE_SERVICES.join(", "),
        )
    }
}

/// Robust fallback used when no API key is configured or content generation
/// fails. Matches the copy the site ships with.
pub fn fallback_content() -> PharmacyData {
    PharmacyData {
        name: "New-Health Pharmacy Ltd".to_string(),
        tagline: "Excellence in Health & Wellness".to_string(),
        hero_hook: "Your Premier Wholesale Pharmacy for Medications Supplements, Skincare, & More. Elevate Your Wellness with Us.".to_string(),
        about: "Providing top-tier pharmaceutical care, diagnostic services, and wellness products with a focus on quality and authenticity.".to_string(),
        value_props: vec![
            ValueProp {
                title: "Genuine Medications".to_string(),
                description: "100% certified pharmaceutical products sourced directly with rigorous verification.".to_string(),
                icon: "fa-shield-heart".to_string(),
            },
            ValueProp {
                title: "Expert Consultation".to_string(),
                description: "Consult with our highly qualified pharmacists for personalized health advice.".to_string(),
                icon: "fa-user-md".to_string(),
            },
            ValueProp {
                title: "Wholesale Value".to_string(),
                description: "Access authentic medications at the most affordable wholesale rates in Abuja.".to_string(),
                icon: "fa-tags".to_string(),
            },
        ],
        reviews: vec![
            Review {
                author: "Idoko Joseph".to_string(),
                text: "It's one of the pharmacy in the heart of Abuja where you can get all sorts of drugs at affordable prices. I highly recommend this place.".to_string(),
                rating: 5,
                avatar: "https://images.unsplash.com/photo-1522529599102-193c0d76b5b6?auto=format&fit=crop&q=80&w=150".to_string(),
            },
            Review {
                author: "Stella A. Ogbonna".to_string(),
                text: "Very good and accommodating. The guys are wonderful people especially their manager Philip.".to_string(),
                rating: 5,
                avatar: "https://images.unsplash.com/photo-1531123897727-8f129e1688ce?auto=format&fit=crop&q=80&w=150".to_string(),
            },
        ],
        contact_info: ContactInfo {
            address: "Behind LG, 4 Ajesa St, Wuse, Abuja (Plus Code: 3FJ8+HV Abuja)".to_string(),
            phone: "08039366563".to_string(),
            email: "info@newhealthpharmacy.com".to_string(),
            hours: "Mon - Sat: 8:00 AM - 7:00 PM (Sunday: Closed)".to_string(),
        },
    }
}

/// Response schema constraining generated marketing content to the
/// `PharmacyData` shape.
pub fn content_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "tagline": { "type": "STRING" },
            "heroHook": { "type": "STRING" },
            "about": { "type": "STRING" },
            "valueProps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "icon": { "type": "STRING" }
                    }
                }
            },
            "reviews": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "author": { "type": "STRING" },
                        "text": { "type": "STRING" },
                        "rating": { "type": "NUMBER" },
                        "avatar": { "type": "STRING" }
                    }
                }
            },
            "contactInfo": {
                "type": "OBJECT",
                "properties": {
                    "address": { "type": "STRING" },
                    "phone": { "type": "STRING" },
                    "email": { "type": "STRING" },
                    "hours": { "type": "STRING" }
                }
            }
        },
        "required": ["name", "tagline", "heroHook", "about", "valueProps", "reviews", "contactInfo"]
    })
}
