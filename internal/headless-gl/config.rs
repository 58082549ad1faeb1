// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

use crate::display::Display;
use crate::egl::{self, EGLConfig, EGLint};
use crate::error::{Error, ErrorKind, Operation};

/// Hardware accelerated, conformant, OpenGL capable. No surface type is requested since
/// contexts are only ever made current without a surface.
pub(crate) const CONFIG_ATTRIBUTES: [EGLint; 7] = [
    egl::EGL_CONFIG_CAVEAT,
    egl::EGL_NONE,
    egl::EGL_CONFORMANT,
    egl::EGL_OPENGL_BIT,
    egl::EGL_RENDERABLE_TYPE,
    egl::EGL_OPENGL_BIT,
    egl::EGL_NONE,
];

/// Picks the first config on `display` matching [`CONFIG_ATTRIBUTES`].
pub(crate) fn select_config(display: &Display) -> Result<EGLConfig, Error> {
    let egl = display.egl();
    let mut configs = [egl::EGL_NO_CONFIG; 1];
    let count = egl
        .choose_config(display.handle(), &CONFIG_ATTRIBUTES, &mut configs)
        .ok_or_else(|| Error::egl(Operation::ChooseConfig, egl.get_error()))?;
    if count == 0 {
        return Err(Error::new(Operation::ChooseConfig, ErrorKind::NoConfig));
    }
    log::trace!("Selected EGL config {:?}", configs[0]);
    Ok(configs[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, CONFIG, Fixture};

    #[test]
    fn requests_accelerated_conformant_opengl() {
        let fixture = Fixture::new(Behavior::default());
        let display = crate::display::resolve(&fixture.platform).unwrap();
        assert_eq!(select_config(&display).unwrap() as usize, CONFIG);
        assert_eq!(fixture.egl.config_attribs(), CONFIG_ATTRIBUTES);
    }

    #[test]
    fn no_match_is_not_a_native_error() {
        let fixture = Fixture::new(Behavior { matching_configs: 0, ..Default::default() });
        let display = crate::display::resolve(&fixture.platform).unwrap();
        let err = select_config(&display).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoConfig);
        assert_eq!(err.code(), None);
    }

    #[test]
    fn native_failure_is_mapped() {
        let fixture = Fixture::new(Behavior { choose_config: false, ..Default::default() });
        let display = crate::display::resolve(&fixture.platform).unwrap();
        let err = select_config(&display).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::BadAttribute);
        assert_eq!(err.operation(), Operation::ChooseConfig);
        assert_eq!(err.code(), Some(egl::EGL_BAD_ATTRIBUTE));
    }
}
