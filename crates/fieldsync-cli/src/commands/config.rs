use crate::cli::{ConfigCommands, RejectionPolicyArg};
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            request_timeout_secs,
            rejection_policy,
            retry_base_secs,
            retry_max_secs,
            no_activate,
        } => run_config_init(
            profile,
            ProfileUpdate {
                api_base_url,
                request_timeout_secs,
                rejection_policy,
                retry_base_secs,
                retry_max_secs,
            },
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(profile, json),
    }
}

/// Values passed to `config init`; unset fields keep the stored value
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub rejection_policy: Option<RejectionPolicyArg>,
    pub retry_base_secs: Option<u64>,
    pub retry_max_secs: Option<u64>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(existing_profile, update)?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Profile '{profile_name}' initialized at {}", path.display());

    if config
        .profile(&profile_name)
        .and_then(|profile| profile.api_base_url.as_deref())
        .is_none()
    {
        println!(
            "Profile '{profile_name}' has no api_base_url yet; sync stays local until one is set."
        );
    }
    Ok(())
}

/// Apply an update and validate the result as a client config
pub fn merge_profile(
    mut profile: CliProfile,
    update: ProfileUpdate,
) -> Result<CliProfile, CliError> {
    if let Some(url) = normalize_text_option(update.api_base_url) {
        profile.api_base_url = Some(url);
    }
    if let Some(secs) = update.request_timeout_secs {
        profile.request_timeout_secs = Some(secs);
    }
    if let Some(policy) = update.rejection_policy {
        profile.rejection_policy = Some(policy.into());
    }
    if let Some(secs) = update.retry_base_secs {
        profile.retry_base_secs = Some(secs);
    }
    if let Some(secs) = update.retry_max_secs {
        profile.retry_max_secs = Some(secs);
    }

    let normalized = profile.client_config(None).map_err(CliError::Config)?;
    profile.api_base_url = normalized.api_base_url;
    Ok(profile)
}

pub fn run_config_show(profile_name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let client = profile
        .client_config(std::env::var("FIELDSYNC_API_URL").ok())
        .map_err(CliError::Config)?;

    if as_json {
        let body = serde_json::json!({ "profile": profile_name, "client": client });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Profile:          {profile_name}");
    println!(
        "API base URL:     {}",
        client.api_base_url.as_deref().unwrap_or("(not configured)")
    );
    println!("Request timeout:  {}s", client.request_timeout_secs);
    println!(
        "Rejection policy: {}",
        serde_json::to_value(client.rejection_policy)?
            .as_str()
            .unwrap_or_default()
    );
    println!(
        "Retry backoff:    {}s .. {}s",
        client.retry_base_secs, client.retry_max_secs
    );
    let token_state = if std::env::var_os("FIELDSYNC_API_TOKEN").is_some() {
        "set (FIELDSYNC_API_TOKEN)"
    } else {
        "not set"
    };
    println!("API token:        {token_state}");
    Ok(())
}
