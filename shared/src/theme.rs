//! Effective theme derivation and the OS theme subscription lifecycle.

use std::sync::Arc;
use tracing::debug;

use crate::capabilities::{Listener, OsThemeSource, Subscription};
use crate::model::{PreferencesPatch, Theme, UserPreferences};

/// System-follow wins over the explicit theme.
#[must_use]
pub const fn resolve(explicit: Theme, use_system_theme: bool, os_theme: Theme) -> Theme {
    if use_system_theme {
        os_theme
    } else {
        explicit
    }
}

/// Holds an OS theme subscription exactly while system-follow is on.
pub struct ThemeResolver {
    source: Arc<dyn OsThemeSource>,
    on_os_change: Listener<Theme>,
    explicit: Theme,
    use_system_theme: bool,
    os_theme: Theme,
    subscription: Option<Subscription>,
}

impl ThemeResolver {
    /// `on_os_change` is handed to the source while following the system.
    pub fn new(
        source: Arc<dyn OsThemeSource>,
        prefs: &UserPreferences,
        on_os_change: Listener<Theme>,
    ) -> Self {
        let os_theme = source.current();
        let mut resolver = Self {
            source,
            on_os_change,
            explicit: prefs.theme,
            use_system_theme: prefs.use_system_theme,
            os_theme,
            subscription: None,
        };
        resolver.sync_subscription();
        resolver
    }

    #[must_use]
    pub fn effective(&self) -> Theme {
        resolve(self.explicit, self.use_system_theme, self.os_theme)
    }

    #[must_use]
    pub fn use_system_theme(&self) -> bool {
        self.use_system_theme
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Switches to the opposite of what is on screen and stops following
    /// the system. Returns the preference change to persist.
    pub fn toggle_theme(&mut self) -> PreferencesPatch {
        let next = self.effective().toggled();
        self.explicit = next;
        self.use_system_theme = false;
        self.sync_subscription();
        debug!(theme = %next, "theme toggled");
        PreferencesPatch::use_system_theme(false).and_theme(next)
    }

    /// Turning follow off pins the theme currently on screen; turning it on
    /// re-reads the OS value immediately.
    pub fn toggle_system_theme(&mut self) -> PreferencesPatch {
        if self.use_system_theme {
            self.explicit = self.effective();
            self.use_system_theme = false;
            self.sync_subscription();
            PreferencesPatch::use_system_theme(false).and_theme(self.explicit)
        } else {
            self.use_system_theme = true;
            self.os_theme = self.source.current();
            self.sync_subscription();
            PreferencesPatch::use_system_theme(true)
        }
    }

    /// The reported theme may be stale by the time it is applied (it sat in
    /// the event queue), so the live source value is taken instead.
    pub fn on_os_theme_changed(&mut self, reported: Theme) {
        if !self.use_system_theme {
            debug!(%reported, "OS theme change ignored, not following system");
            return;
        }
        self.os_theme = self.source.current();
        if self.os_theme != reported {
            debug!(%reported, current = %self.os_theme, "stale OS theme notice");
        }
    }

    /// Adopts preferences that changed underneath, e.g. from reconciliation.
    pub fn apply_preferences(&mut self, prefs: &UserPreferences) {
        self.explicit = prefs.theme;
        if prefs.use_system_theme && !self.use_system_theme {
            self.os_theme = self.source.current();
        }
        self.use_system_theme = prefs.use_system_theme;
        self.sync_subscription();
    }

    fn sync_subscription(&mut self) {
        match (self.use_system_theme, self.subscription.is_some()) {
            (true, false) => {
                self.subscription = Some(self.source.subscribe(Arc::clone(&self.on_os_change)));
                debug!("subscribed to OS theme");
            }
            (false, true) => {
                self.subscription = None;
                debug!("unsubscribed from OS theme");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ManualOsTheme;
    use crate::model::LanguageCode;
    use proptest::prelude::*;

    fn prefs(theme: Theme, use_system_theme: bool) -> UserPreferences {
        UserPreferences {
            language: LanguageCode::english(),
            theme,
            use_system_theme,
        }
    }

    fn resolver(os: &Arc<ManualOsTheme>, prefs: &UserPreferences) -> ThemeResolver {
        let source: Arc<dyn OsThemeSource> = Arc::clone(os) as Arc<dyn OsThemeSource>;
        ThemeResolver::new(source, prefs, Arc::new(|_| {}))
    }

    fn theme_strategy() -> impl Strategy<Value = Theme> {
        prop_oneof![Just(Theme::Light), Just(Theme::Dark)]
    }

    #[test]
    fn system_dark_overrides_explicit_light() {
        assert_eq!(resolve(Theme::Light, true, Theme::Dark), Theme::Dark);
    }

    #[test]
    fn toggle_flips_what_is_on_screen_and_stops_following() {
        let os = Arc::new(ManualOsTheme::new(Theme::Dark));
        let mut theme = resolver(&os, &prefs(Theme::Light, true));
        assert_eq!(theme.effective(), Theme::Dark);

        let patch = theme.toggle_theme();

        assert_eq!(theme.effective(), Theme::Light);
        assert!(!theme.use_system_theme());
        assert_eq!(patch.use_system_theme, Some(false));
        assert_eq!(patch.theme, Some(Theme::Light));
        assert_eq!(os.subscriber_count(), 0);
    }

    #[test]
    fn subscription_follows_the_flag_without_leaking() {
        let os = Arc::new(ManualOsTheme::new(Theme::Light));
        let mut theme = resolver(&os, &prefs(Theme::Light, false));
        assert_eq!(os.subscriber_count(), 0);

        for _ in 0..3 {
            theme.toggle_system_theme();
            assert_eq!(os.subscriber_count(), 1);
            theme.toggle_system_theme();
            assert_eq!(os.subscriber_count(), 0);
        }
    }

    #[test]
    fn enabling_follow_reads_the_live_os_value() {
        let os = Arc::new(ManualOsTheme::new(Theme::Light));
        let mut theme = resolver(&os, &prefs(Theme::Light, false));
        os.set(Theme::Dark);
        assert_eq!(theme.effective(), Theme::Light);

        theme.toggle_system_theme();

        assert_eq!(theme.effective(), Theme::Dark);
    }

    #[test]
    fn disabling_follow_pins_the_current_theme() {
        let os = Arc::new(ManualOsTheme::new(Theme::Dark));
        let mut theme = resolver(&os, &prefs(Theme::Light, true));

        let patch = theme.toggle_system_theme();

        assert_eq!(theme.effective(), Theme::Dark);
        assert_eq!(patch.theme, Some(Theme::Dark));
    }

    #[test]
    fn os_changes_are_ignored_when_not_following() {
        let os = Arc::new(ManualOsTheme::new(Theme::Light));
        let mut theme = resolver(&os, &prefs(Theme::Light, false));
        theme.on_os_theme_changed(Theme::Dark);
        assert_eq!(theme.effective(), Theme::Light);
    }

    #[test]
    fn a_stale_notice_yields_to_the_live_os_value() {
        let os = Arc::new(ManualOsTheme::new(Theme::Light));
        let mut theme = resolver(&os, &prefs(Theme::Light, true));

        theme.on_os_theme_changed(Theme::Dark);

        assert_eq!(theme.effective(), Theme::Light);
    }

    #[test]
    fn dropping_the_resolver_releases_the_subscription() {
        let os = Arc::new(ManualOsTheme::new(Theme::Light));
        let theme = resolver(&os, &prefs(Theme::Light, true));
        assert_eq!(os.subscriber_count(), 1);
        drop(theme);
        assert_eq!(os.subscriber_count(), 0);
    }

    proptest! {
        #[test]
        fn effective_theme_matches_precedence(
            explicit in theme_strategy(),
            follow in any::<bool>(),
            os_theme in theme_strategy(),
        ) {
            let expected = if follow { os_theme } else { explicit };
            prop_assert_eq!(resolve(explicit, follow, os_theme), expected);
        }

        #[test]
        fn toggle_always_yields_the_opposite(
            explicit in theme_strategy(),
            follow in any::<bool>(),
            os_theme in theme_strategy(),
        ) {
            let os = Arc::new(ManualOsTheme::new(os_theme));
            let mut theme = resolver(&os, &prefs(explicit, follow));
            let before = theme.effective();
            theme.toggle_theme();
            prop_assert_eq!(theme.effective(), before.toggled());
            prop_assert!(!theme.is_subscribed());
        }
    }
}
