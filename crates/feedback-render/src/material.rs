use feedback_core::{translate, EffectParameters, Uniforms};

/// A blend program together with the uniforms it will be invoked with.
#[derive(Debug)]
pub struct BlendMaterial<P> {
    program: P,
    uniforms: Uniforms,
}

impl<P> BlendMaterial<P> {
    /// Wrap a freshly resolved program with default uniforms.
    pub fn new(program: P) -> Self {
        Self {
            program,
            uniforms: Uniforms::default(),
        }
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    /// Refresh the uniforms from this frame's parameters.
    pub fn apply(&mut self, params: &EffectParameters) -> Uniforms {
        self.uniforms = translate(params);
        self.uniforms
    }

    pub fn into_program(self) -> P {
        self.program
    }
}
