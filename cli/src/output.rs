use colored::*;

use newhealth_core::{GroundingMetadata, PharmacyData, Role, Turn};

pub fn print_banner() {
    println!("{}", "New-Health Pharmacy Assistant".green().bold());
    println!(
        "{}",
        "Commands: /deep toggles deep analysis, /clear resets history, /quit exits.".dimmed()
    );
    println!();
}

pub fn print_usage_instructions() {
    println!("Usage:");
    println!("  newhealth \"<prompt>\"      send a single message");
    println!("  newhealth --interactive   start an interactive chat");
    println!("  newhealth --voice         start a voice call (PCM16 on stdin)");
    println!("  newhealth --content       print the pharmacy marketing content");
}

pub fn print_turn(turn: &Turn) {
    let label = match turn.role {
        Role::User => "You".cyan().bold(),
        Role::Model => "Assistant".green().bold(),
    };
    println!("{}: {}", label, turn.text());
    if let Some(grounding) = &turn.grounding {
        print_sources(grounding);
    }
    println!();
}

/// Numbered list of the web sources a grounded answer cited.
pub fn print_sources(grounding: &GroundingMetadata) {
    let sources: Vec<_> = grounding
        .grounding_chunks
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .collect();
    if sources.is_empty() {
        return;
    }
    println!("{}", "  Sources:".dimmed());
    for (index, source) in sources.iter().enumerate() {
        println!(
            "{}",
            format!("  [{}] {} <{}>", index + 1, source.title, source.uri).dimmed()
        );
    }
}

pub fn print_content(data: &PharmacyData) {
    println!("{}", data.name.green().bold());
    println!("{}", data.tagline.italic());
    println!();
    println!("{}", data.hero_hook);
    println!();
    println!("{}", data.about);
    println!();
    for prop in &data.value_props {
        println!("  {} {}", "*".green(), prop.title.bold());
        println!("    {}", prop.description);
    }
    println!();
    for review in &data.reviews {
        println!(
            "  {} {}",
            "★".repeat(usize::from(review.rating)).yellow(),
            review.author.bold()
        );
        println!("    \"{}\"", review.text);
    }
    println!();
    println!(
        "{} {} | {} | {}",
        "Contact:".bold(),
        data.contact_info.address,
        data.contact_info.phone,
        data.contact_info.hours
    );
}
