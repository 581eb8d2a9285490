use circle_config::UserConfig;
use circle_storage::Profile;

use crate::context::Context;

pub async fn cmd_init(
    ctx: &mut Context,
    user_id: &str,
    name: &str,
    email: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let previous = ctx.config.user.as_ref().map(|u| u.user_id.clone());
    if previous.as_deref().is_some_and(|id| id != user_id) {
        // Group selection belongs to the previous user
        ctx.config.groups.clear();
        ctx.config.clear_group_data();
    }

    ctx.config.user = Some(UserConfig {
        user_id: user_id.to_string(),
        name: name.to_string(),
        email: email.map(str::to_string),
    });
    ctx.save_config()?;

    let profile = Profile {
        name: name.to_string(),
        email: email.map(str::to_string),
    };
    println!("Signed in as {name} ({user_id})");
    if let Err(e) = ctx.reconciler().push_profile(&profile).await {
        println!("  Profile not published yet: {e}");
    }
    println!("  Config: {}", ctx.config_path().display());

    Ok(())
}
